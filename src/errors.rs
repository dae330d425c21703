//! Release relay error hierarchy
//!
//! Errors are grouped by the component that raises them. Only conditions that
//! prevent the engine from keeping a correct mirror of the source are fatal;
//! per-record and per-sink conditions are recovered locally.

use std::time::Duration;

use config::ConfigError;

use crate::ObjectKey;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (signal handling, IO)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote list/watch source failures
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Sink delivery failures
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Source object could not be mapped to a domain event
    #[error(transparent)]
    Translate(#[from] TranslateError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Token file, signal handler registration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport level failure (connect, reset, body read)
    #[error("Source request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the source API
    #[error("Source returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// Credentials were rejected; retrying will not help
    #[error("Source rejected credentials (status {code})")]
    Unauthorized { code: u16 },

    /// Payload could not be decoded
    #[error("Failed to decode source payload: {0}")]
    Decode(String),

    /// Single request exceeded its deadline
    #[error("Source request timeout after {0:?}")]
    Timeout(Duration),

    /// Retry policy exhaustion
    #[error("Source {operation} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: &'static str,
        attempts: usize,
        last: String,
    },

    /// Subscription torn down by a shutdown request
    #[error("Source subscription cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether the adapter may back off and try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http(_) | SourceError::Timeout(_) | SourceError::Decode(_) => true,
            SourceError::Status { code, .. } => *code == 429 || *code >= 500,
            SourceError::Unauthorized { .. }
            | SourceError::RetryExhausted { .. }
            | SourceError::Cancelled => false,
        }
    }

    /// Whether the server discarded the requested checkpoint (HTTP 410 Gone).
    pub fn is_expired(&self) -> bool {
        matches!(self, SourceError::Status { code: 410, .. })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// Backend refused the event
    #[error("Event rejected: {0}")]
    Rejected(String),

    /// Backend could not be reached
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// Attempt exceeded the per-attempt timeout
    #[error("Sink attempt timeout after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Object {key} is missing required field `{field}`")]
    MissingField { key: ObjectKey, field: &'static str },

    /// Raw object without a usable identity or generation marker
    #[error("Unclassifiable source object: {reason}")]
    Unclassifiable { reason: String },
}
