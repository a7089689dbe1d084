//! Error types for backdesk
//!
//! One closed error enum covering every failure mode in the data layer.
//! Uses thiserror for ergonomic error handling.
//!
//! The three wire-facing variants follow the transport taxonomy: `Network`
//! (the request never completed), `Server` (a non-2xx response, with the
//! structured error body when the server sent one), and `Serialization`
//! (a response body that does not match the expected shape).

use thiserror::Error;

/// Result type alias for backdesk operations
pub type Result<T> = std::result::Result<T, BackdeskError>;

/// Error type for backdesk operations
#[derive(Error, Debug)]
pub enum BackdeskError {
    /// Configuration errors (bad config file, invalid base URL, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request never reached the server or no response arrived
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the server
    #[error("Server failure: HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body could not be parsed as the expected shape
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// Subscribe/mutate referenced an endpoint name the registry does not know
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Two endpoint declarations registered under the same name
    #[error("Duplicate endpoint registration: {0}")]
    DuplicateEndpoint(String),

    /// Operation on a cache that has been disposed
    #[error("Query cache has been disposed")]
    Disposed,

    /// JSON serialization/deserialization errors (cache keys, bodies)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors (config file)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackdeskError {
    /// True for the rejected-entry errors a consumer may want to display
    /// alongside stale data, as opposed to programming or configuration
    /// errors that should fail loudly.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BackdeskError::Network(_)
                | BackdeskError::Server { .. }
                | BackdeskError::Serialization(_)
        )
    }
}

impl crate::retry::RetryableError for BackdeskError {
    fn retry_decision(&self) -> crate::retry::RetryDecision {
        use crate::retry::RetryDecision;
        use std::time::Duration;

        match self {
            // The request never completed; trying again can succeed.
            BackdeskError::Network(e) => {
                if e.is_builder() {
                    // Malformed request, will fail identically next time.
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::Retry
                }
            }
            BackdeskError::Server { status, .. } => match status {
                429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
                500..=599 => RetryDecision::Retry,
                _ => RetryDecision::NoRetry,
            },
            // A bad body will stay bad; everything local is permanent too.
            BackdeskError::Serialization(_)
            | BackdeskError::Config(_)
            | BackdeskError::UnknownEndpoint(_)
            | BackdeskError::DuplicateEndpoint(_)
            | BackdeskError::Disposed
            | BackdeskError::Json(_)
            | BackdeskError::Yaml(_)
            | BackdeskError::Io(_) => RetryDecision::NoRetry,
        }
    }
}
