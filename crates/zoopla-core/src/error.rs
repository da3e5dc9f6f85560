use thiserror::Error;

/// Application-wide error types for the scraper.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (bad URL, non-2xx status, unreadable body).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error (DNS, refused, reset, proxy unreachable).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A structured-data block or page fragment could not be mapped to a record.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration file missing, malformed, or rejected by the input schema.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error happened while fetching a page.
    ///
    /// Transport errors are recovered per URL by the extractor; everything
    /// else is either recovered per block (parse) or fatal (config).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_) | AppError::Timeout(_) | AppError::NetworkError(_)
        )
    }
}
