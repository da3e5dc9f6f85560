use std::future::Future;

use crate::error::AppError;
use crate::models::{Record, RecordKind};
use crate::proxy::ProxyEndpoint;

/// Fetches raw HTML content from a URL, optionally through a proxy.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns one page of HTML into records of a single kind.
///
/// Parsing never fails as a whole: unusable fragments are skipped and a page
/// with nothing recognisable yields an empty vector.
pub trait RecordParser: Send + Sync + Clone + 'static {
    fn kind(&self) -> RecordKind;

    fn parse(&self, html: &str) -> Vec<Record>;
}
