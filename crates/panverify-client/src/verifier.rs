//! Retrying verifier on top of a [`PanApi`].

use crate::api::{HttpPanApi, PanApi};
use crate::error::Result;
use crate::response::interpret;
use async_trait::async_trait;
use panverify_core::{Pan, RetryPolicy, ServiceConfig, VerificationOutcome};

/// Anything that can turn an identifier into an outcome.
///
/// Verification never fails from the caller's point of view: transient
/// service problems are retried internally and an exhausted budget comes
/// back as an invalid outcome describing the last error.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verify one normalized identifier.
    async fn verify(&self, identifier: &Pan) -> VerificationOutcome;
}

/// [`Verifier`] that retries a [`PanApi`] under a bounded [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct PanVerifier<A> {
    api: A,
    policy: RetryPolicy,
    valid_status: String,
}

impl<A: PanApi> PanVerifier<A> {
    /// Wrap `api` with the retry budget and status sentinel from `config`.
    #[must_use]
    pub fn new(api: A, config: &ServiceConfig) -> Self {
        Self::with_policy(
            api,
            RetryPolicy::bounded(config.max_attempts, config.retry_delay()),
            config.valid_status.clone(),
        )
    }

    /// Wrap `api` with an explicit policy.
    #[must_use]
    pub fn with_policy(api: A, policy: RetryPolicy, valid_status: impl Into<String>) -> Self {
        Self {
            api,
            policy,
            valid_status: valid_status.into(),
        }
    }

    /// The underlying single-attempt API.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Retry policy in use.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl PanVerifier<HttpPanApi> {
    /// Build an HTTP-backed verifier from configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(HttpPanApi::new(config.clone())?, config))
    }
}

#[async_trait]
impl<A: PanApi> Verifier for PanVerifier<A> {
    async fn verify(&self, identifier: &Pan) -> VerificationOutcome {
        if identifier.is_empty() {
            return VerificationOutcome::empty_identifier();
        }

        let result = self
            .policy
            .run(
                |attempt| {
                    tracing::debug!(pan = %identifier, attempt, "Calling verification service");
                    self.api.check(identifier)
                },
                |attempt, error| {
                    tracing::warn!(
                        pan = %identifier,
                        attempt,
                        error = %error,
                        "Verification attempt failed, retrying in {:?}",
                        self.policy.delay()
                    );
                },
            )
            .await;

        match result {
            Ok(body) => interpret(&body, &self.valid_status),
            Err(exhausted) => {
                tracing::warn!(
                    pan = %identifier,
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Verification gave up"
                );
                VerificationOutcome::invalid(format!(
                    "{}: {} (gave up after {} attempts)",
                    exhausted.last_error.class(),
                    exhausted.last_error,
                    exhausted.attempts
                ))
            }
        }
    }
}
