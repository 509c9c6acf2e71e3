//! Error types for calls against the automation service
//!
//! Transport failures never cross component boundaries as panics: every call
//! returns one of these as a tagged result and the immediate caller decides
//! what the user sees.

use thiserror::Error;

/// Failure of a single HTTP call after the retry budget was spent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt did not complete within its timeout and was aborted
    #[error("timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection refused, reset, DNS failure, ...
    #[error("transport error: {0}")]
    Request(String),

    /// The service answered with a non-2xx status
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// The body was not valid JSON
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The endpoint could not be turned into a URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Outcome of a service call as seen by the registry and the buttons
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Health probe failed, the registry is not syncing
    #[error("automation service unavailable")]
    ConnectionUnavailable,

    /// The call failed at the transport level
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The call went through but the service answered `success: false`
    #[error("rejected by service: {0}")]
    Rejected(String),

    /// The body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True when the underlying transport gave up because of a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(TransportError::Timeout { .. }))
    }

    /// Short text suitable for a toast
    pub fn user_message(&self) -> String {
        match self {
            ApiError::ConnectionUnavailable => "Service offline".to_string(),
            ApiError::Transport(TransportError::Timeout { .. }) => "Service timed out".to_string(),
            ApiError::Transport(_) => "Service not responding".to_string(),
            ApiError::Rejected(msg) => msg.clone(),
            ApiError::Decode(_) => "Unexpected response".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_detection() {
        let err = ApiError::from(TransportError::Timeout { after_ms: 5000 });
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "timeout after 5000ms");

        let err = ApiError::from(TransportError::Status { status: 500 });
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_rejected_message_is_shown_verbatim() {
        let err = ApiError::Rejected("port already in use".to_string());
        assert_eq!(err.user_message(), "port already in use");
    }
}
