//! Service client - call policy on top of the raw transport
//!
//! Chooses the retry budget per call class (probe / query / mutation),
//! turns `success: false` bodies into [`ApiError::Rejected`] and decodes
//! typed responses.

pub mod endpoints;
pub mod wire;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::transport::{CallOptions, Endpoint, Transport};

/// Retry presets for the three call classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub probe: CallOptions,
    pub query: CallOptions,
    pub mutation: CallOptions,
}

impl CallPolicy {
    pub fn from_config(api: &ApiConfig) -> Self {
        let timeout = Duration::from_millis(api.timeout_ms);
        let backoff = Duration::from_millis(api.backoff_base_ms);
        Self {
            probe: CallOptions::probe(timeout).with_backoff_base(backoff),
            query: CallOptions::new(timeout, api.max_retries).with_backoff_base(backoff),
            mutation: CallOptions::new(timeout, api.mutation_retries).with_backoff_base(backoff),
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default())
    }
}

/// Cloneable handle to the automation service
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    policy: CallPolicy,
}

impl ServiceClient {
    pub fn new(transport: Arc<dyn Transport>, policy: CallPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Single attempt, no retry
    pub async fn probe(&self, endpoint: &Endpoint) -> Result<Value, ApiError> {
        self.send(endpoint, self.policy.probe).await
    }

    /// Read-only call with the query retry budget
    pub async fn query(&self, endpoint: &Endpoint) -> Result<Value, ApiError> {
        self.send(endpoint, self.policy.query).await
    }

    /// State-changing call with the mutation retry budget
    pub async fn mutate(&self, endpoint: &Endpoint) -> Result<Value, ApiError> {
        self.send(endpoint, self.policy.mutation).await
    }

    pub async fn query_as<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, ApiError> {
        decode(self.query(endpoint).await?)
    }

    pub async fn mutate_as<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, ApiError> {
        decode(self.mutate(endpoint).await?)
    }

    /// Mutation whose body is decoded even when it reports `success: false`
    pub async fn mutate_raw_as<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
    ) -> Result<T, ApiError> {
        let body = self.transport.call(endpoint, self.policy.mutation).await?;
        decode(body)
    }

    async fn send(&self, endpoint: &Endpoint, options: CallOptions) -> Result<Value, ApiError> {
        let body = self.transport.call(endpoint, options).await?;
        check_success(body)
    }
}

/// Reject bodies that explicitly say `success: false`
pub fn check_success(body: Value) -> Result<Value, ApiError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(ApiError::Rejected(message));
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}
