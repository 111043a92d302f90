//! panverify Client - verification service access with bounded retry.
//!
//! This crate turns a normalized PAN into a [`VerificationOutcome`] by asking
//! the remote verification service. It never touches the record store.
//!
//! # Layers
//!
//! - [`PanApi`]: exactly one HTTP round trip, returning the raw 2xx body
//! - [`interpret`]: maps a body to valid/invalid plus a description
//! - [`PanVerifier`]: retries a `PanApi` under a [`RetryPolicy`] and folds an
//!   exhausted budget into an invalid outcome
//!
//! # Example
//!
//! ```rust,no_run
//! use panverify_client::{PanVerifier, Verifier};
//! use panverify_core::{Pan, ServiceConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = PanVerifier::from_config(&ServiceConfig::default())?;
//! let outcome = verifier.verify(&Pan::normalize(Some("abcde1234f"))).await;
//! println!("{:?}: {}", outcome.is_valid, outcome.message);
//! # Ok(())
//! # }
//! ```
//!
//! [`VerificationOutcome`]: panverify_core::VerificationOutcome
//! [`RetryPolicy`]: panverify_core::RetryPolicy

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod error;
pub mod response;
pub mod verifier;

// Re-export commonly used types
pub use api::{HttpPanApi, PanApi};
pub use error::{ClientError, Result};
pub use response::{interpret, NO_MESSAGE};
pub use verifier::{PanVerifier, Verifier};
