//! panverify Core - Foundation crate for the PAN verification pipeline.
//!
//! This crate provides the record model, identifier normalization, the shared
//! retry policy and configuration management that all other panverify crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Configuration error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Record model, `Pan` newtype, selection enums
//! - [`retry`] - Fixed-delay retry policy with optional attempt bound
//!
//! # Example
//!
//! ```rust
//! use panverify_core::{AppConfig, Pan};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.service.max_attempts, 3);
//!
//! let pan = Pan::normalize(Some("  abcde1234f "));
//! assert_eq!(pan.as_str(), "ABCDE1234F");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, ColumnMap, DatabaseConfig, PipelineSettings, SelectionConfig, ServiceConfig,
    TableConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use retry::{Exhausted, RetryPolicy};
pub use types::{
    Pan, Record, RecordKey, SelectionMode, SortOrder, UpdateScope, ValidationState,
    VerificationOutcome, EMPTY_IDENTIFIER_MESSAGE,
};
