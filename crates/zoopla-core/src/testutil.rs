//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{AgentRecord, Record, RecordKind, RecordSource};
use crate::proxy::ProxyEndpoint;
use crate::traits::{Fetcher, RecordParser};

/// Recorded request: (url, proxy used).
pub type RequestRecord = (String, Option<ProxyEndpoint>);

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with per-URL responses and optional per-URL latency.
///
/// Each configured response is served once; unknown or already-served URLs
/// fail with an HTTP 404 error.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<String, AppError>>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requests: Arc<Mutex<Vec<RequestRecord>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_error(self, url: &str, error: AppError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
        self
    }

    /// Sleep for `delay` before answering requests for `url`.
    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    /// Every request seen so far, in the order it was made.
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of `fetch` calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> Result<String, AppError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), proxy.cloned()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self.responses.lock().unwrap().remove(url);
        response.unwrap_or_else(|| Err(AppError::HttpError(format!("HTTP 404 for {url}"))))
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser that turns every non-empty line of the page into an agent
/// record named after that line.
#[derive(Clone, Default)]
pub struct MockParser;

impl MockParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for MockParser {
    fn kind(&self) -> RecordKind {
        RecordKind::Agent
    }

    fn parse(&self, html: &str) -> Vec<Record> {
        html.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|line| {
                let mut agent = AgentRecord::new(RecordSource::Dom);
                agent.name = Some(line.to_string());
                Record::Agent(agent)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return everything it logged.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
