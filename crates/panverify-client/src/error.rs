//! Error types for the verification client.

use thiserror::Error;

/// Errors from a single call to the verification service.
///
/// None of these reach the pipeline directly: the verifier retries them and
/// turns an exhausted budget into an invalid outcome.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No response within the configured timeout
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// Connection, TLS or body transfer failure
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status
    #[error("status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Build(String),
}

impl ClientError {
    /// Short label used as the prefix of an exhaustion message.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "API Timeout",
            Self::Transport(_) | Self::Build(_) => "API Request Error",
            Self::Status { .. } => "API Error",
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
