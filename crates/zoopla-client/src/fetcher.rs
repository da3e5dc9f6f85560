use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Proxy};
use url::Url;
use zoopla_core::error::AppError;
use zoopla_core::proxy::ProxyEndpoint;
use zoopla_core::traits::Fetcher;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; ZooplaScraper/1.0; +https://bitbash.dev/)";

/// HTTP fetcher using reqwest.
///
/// reqwest binds proxies to a client, so one client is built per proxy
/// endpoint the first time it is used and reused afterwards. Requests made
/// without a proxy share a single direct client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    direct: Client,
    proxied: Arc<Mutex<HashMap<ProxyEndpoint, Client>>>,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            direct: build_client(timeout, None)?,
            proxied: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        })
    }

    /// Client for `proxy`, building and caching it on first use.
    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client, AppError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.proxied.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_client(self.timeout, Some(proxy))?;
        clients.insert(proxy.clone(), client.clone());
        Ok(client)
    }

    /// Number of per-proxy clients built so far.
    pub fn proxy_client_count(&self) -> usize {
        self.proxied.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> Result<String, AppError> {
        validate_url(url)?;
        let client = self.client_for(proxy)?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })
    }
}

fn build_client(timeout: Duration, proxy: Option<&ProxyEndpoint>) -> Result<Client, AppError> {
    let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);

    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy.url())
            .map_err(|e| AppError::NetworkError(format!("Invalid proxy {proxy}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// Only absolute http/https URLs are fetched.
fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::HttpError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
