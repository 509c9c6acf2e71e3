//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use super::retry::with_backoff;
use super::{CallOptions, Endpoint, Transport};
use crate::error::TransportError;

/// HTTP transport against a fixed base URL
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the given base URL (e.g. `http://127.0.0.1:8765`)
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base = Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        // Timeouts are applied per attempt by the retry loop, not here
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build the full URL, percent-encoding segments and query values
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::InvalidUrl(self.base.to_string()))?;
            segments.pop_if_empty();
            segments.extend(endpoint.segments());
        }
        if !endpoint.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(endpoint.query_pairs());
        }
        Ok(url)
    }

    async fn attempt(&self, url: Url) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::InvalidBody(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, endpoint: &Endpoint, options: CallOptions) -> Result<Value, TransportError> {
        let url = self.url_for(endpoint)?;
        let label = endpoint.to_string();
        debug!("→ GET {}", url);

        let result = with_backoff(&options, &label, |_| self.attempt(url.clone())).await;

        if let Err(e) = &result {
            warn!("API error [{}]: {}", label, e);
        }
        result
    }
}
