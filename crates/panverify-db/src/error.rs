//! Record store error types.
//!
//! Provides error handling for store operations using `thiserror`. The
//! variants split into three groups the pipeline treats differently:
//! connectivity (retried after a cooldown), configuration (fatal at startup)
//! and persistence (counted, the run continues).

use thiserror::Error;

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection URL or options could not be parsed.
    #[error("failed to open database: {0}")]
    Open(String),

    /// No connection could be acquired.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// Invalid encryption key provided.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Target table does not exist.
    #[error("table '{table}' does not exist")]
    MissingTable {
        /// Configured table name
        table: String,
    },

    /// A mapped column does not exist in the target table.
    #[error("column '{column}' does not exist in table '{table}'")]
    MissingColumn {
        /// Configured table name
        table: String,
        /// Missing column name
        column: String,
    },

    /// An update matched no rows.
    #[error("no record matched {0}")]
    NotFound(String),

    /// Failed to decode a stored value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the error is a deployment problem no retry can fix.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Open(_) | Self::InvalidKey(_) | Self::MissingTable { .. } | Self::MissingColumn { .. }
        )
    }

    /// Whether the error means the store could not be reached.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
