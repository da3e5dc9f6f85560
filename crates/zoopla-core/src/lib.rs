pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod proxy;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Mode, OutputFormat, ScraperConfig};
pub use error::AppError;
pub use extract::{ConcurrentExtractor, ExtractionReporter, ExtractorConfig, TracingExtractionReporter};
pub use models::{
    AgentRecord, Coordinates, ExtractionTarget, PriceRecord, PropertyRecord, Record, RecordKind,
    RecordSource,
};
pub use proxy::{ProxyEndpoint, ProxyRotator};
pub use traits::{Fetcher, RecordParser};
