//! Mapping of command results to process exit codes.

use panverify_client::ClientError;
use panverify_core::ConfigError;
use panverify_db::StoreError;
use panverify_pipeline::PipelineError;
use std::process::ExitCode;

/// How a command ended, as seen by the calling shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Everything went through
    Success,
    /// The run drained but some outcomes were not saved
    CompletedWithErrors,
    /// Aborted for a reason other than configuration
    Failure,
    /// Configuration or table layout is wrong; rerunning will not help
    Configuration,
}

impl Exit {
    /// Numeric exit code.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::CompletedWithErrors | Self::Failure => 1,
            Self::Configuration => 2,
        }
    }

    /// Classify a command error by walking its source chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let configuration = err.chain().any(|cause| {
            cause.is::<ConfigError>()
                || cause
                    .downcast_ref::<StoreError>()
                    .is_some_and(StoreError::is_configuration)
                || cause
                    .downcast_ref::<PipelineError>()
                    .is_some_and(PipelineError::is_configuration)
                || matches!(cause.downcast_ref::<ClientError>(), Some(ClientError::Build(_)))
        });
        if configuration {
            Self::Configuration
        } else {
            Self::Failure
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}
