//! panverify Pipeline - resumable verification of stored PAN records.
//!
//! This crate ties the record store and the verification client together.
//! Progress lives entirely in the store: a record counts as processed once
//! its outcome is committed, so an interrupted run simply resumes with the
//! records that are still unprocessed.
//!
//! # Features
//!
//! - Single-record or batch selection with configurable ordering
//! - Strictly serial calls spaced by a minimum interval
//! - Connection loss waited out with a fixed cooldown
//! - Persistence failures counted without stalling the loop
//!
//! # Example
//!
//! ```rust,ignore
//! use panverify_client::PanVerifier;
//! use panverify_core::AppConfig;
//! use panverify_db::AnyRecordStore;
//! use panverify_pipeline::{ConsoleReporter, Pipeline, PipelineOptions};
//!
//! let config = AppConfig::load_with_env(None)?;
//! let store = AnyRecordStore::connect(&config.database, &config.table)?;
//! let verifier = PanVerifier::from_config(&config.service)?;
//!
//! let mut pipeline = Pipeline::new(
//!     store,
//!     verifier,
//!     ConsoleReporter::stdout(),
//!     PipelineOptions::from_config(&config),
//! );
//! let summary = pipeline.run().await?;
//! println!("processed={} errors={}", summary.processed, summary.errors);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod driver;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod rate_limit;
pub mod report;

// Re-export commonly used types
pub use driver::{Pipeline, PipelineOptions, RunSummary};
pub use error::{PipelineError, Result};
pub use rate_limit::RateLimiter;
pub use report::{ConsoleReporter, Reporter};
