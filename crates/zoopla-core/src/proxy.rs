//! Round-robin proxy rotation shared across concurrent fetch tasks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An outbound proxy, as configured (`host:port` or a full URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The endpoint as a proxy URL. Bare `host:port` values default to `http://`.
    pub fn url(&self) -> String {
        if self.0.contains("://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProxyEndpoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProxyEndpoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hands out proxies in round-robin order.
///
/// The endpoint list is fixed at construction; only the cursor and the
/// enabled flag change afterwards, both atomically, so a single rotator can
/// be shared behind an `Arc` by every fetch task. `disable()` keeps the
/// cursor where it is and a later `enable()` resumes from there.
#[derive(Debug)]
pub struct ProxyRotator {
    endpoints: Arc<[ProxyEndpoint]>,
    enabled: AtomicBool,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    pub fn new<I, P>(endpoints: I, enabled: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProxyEndpoint>,
    {
        let endpoints: Arc<[ProxyEndpoint]> = endpoints.into_iter().map(Into::into).collect();
        if enabled && endpoints.is_empty() {
            tracing::warn!("Proxy rotation enabled but no proxies were provided");
        }

        Self {
            endpoints,
            enabled: AtomicBool::new(enabled),
            cursor: AtomicUsize::new(0),
        }
    }

    /// A rotator that never hands out a proxy.
    pub fn disabled() -> Self {
        Self::new(Vec::<ProxyEndpoint>::new(), false)
    }

    /// Returns the next proxy, or `None` when rotation is off or the pool is empty.
    pub fn next(&self) -> Option<ProxyEndpoint> {
        if !self.is_enabled() || self.endpoints.is_empty() {
            return None;
        }

        let len = self.endpoints.len();
        // fetch_update only fails if the closure returns None, which it never does.
        let slot = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);

        let proxy = self.endpoints[slot % len].clone();
        tracing::debug!(proxy = %proxy, "Using proxy");
        Some(proxy)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn rotation on. Does nothing (besides warning) when the pool is empty.
    pub fn enable(&self) {
        if self.endpoints.is_empty() {
            tracing::warn!("Cannot enable proxy rotation: no proxies available");
            return;
        }
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for ProxyRotator {
    fn default() -> Self {
        Self::disabled()
    }
}
