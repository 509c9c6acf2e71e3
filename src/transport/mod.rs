//! Transport layer - HTTP GET calls to the local automation service
//!
//! Every call is bounded by a per-attempt timeout and retried with
//! exponential backoff. All outcomes are normalised into
//! `Result<serde_json::Value, TransportError>`.

pub mod http;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

pub use http::HttpTransport;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default first backoff step (doubled on every further attempt)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Timeout and retry budget for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Additional attempts after the first one fails
    pub max_retries: u32,
    /// Wait before retry `n` is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl CallOptions {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }

    /// Single attempt, no retry (health probe)
    pub fn probe(timeout: Duration) -> Self {
        Self::new(timeout, 0)
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS), 0)
    }
}

/// Path + query of a service endpoint
///
/// Segments and query values are stored raw; percent-encoding is applied
/// when the transport builds the final URL, so device names and uids with
/// spaces or slashes stay a single segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl Endpoint {
    /// Build from a static path such as `"/audio/status"`
    pub fn path(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
        }
    }

    /// Append one raw path segment
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append one query pair
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, k, v)?;
        }
        Ok(())
    }
}

/// Transport trait - the only way the core talks to the service
///
/// Implementations must not mutate shared state and must be safe to call
/// from several buttons at once; no ordering is implied between calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, endpoint: &Endpoint, options: CallOptions) -> Result<Value, TransportError>;
}
