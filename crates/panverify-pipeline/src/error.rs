use panverify_db::StoreError;
use thiserror::Error;

/// Conditions that stop a run before it drains.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store is reachable but does not match the configured layout.
    #[error("configuration error: {0}")]
    Configuration(#[source] StoreError),

    /// A bounded reconnect budget ran out.
    #[error("record store unavailable after {attempts} attempts: {source}")]
    StoreUnavailable { attempts: u32, source: StoreError },
}

impl PipelineError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
