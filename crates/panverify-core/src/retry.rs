//! Retry policy shared by the connection loop and the verification client.
//!
//! Both cases use the same shape: run an operation, and on failure wait a
//! fixed delay before trying again, until the attempt budget (if any) is
//! spent. The connection loop uses an unbounded policy with a long cooldown;
//! the verification client uses a small bounded one.

use std::future::Future;
use std::time::Duration;

/// Fixed-delay retry policy with an optional attempt bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    delay: Duration,
}

/// Returned when a bounded policy runs out of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    /// Number of attempts made
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: E,
}

impl RetryPolicy {
    /// Policy that makes at most `max_attempts` attempts in total.
    ///
    /// A bound of zero is treated as one attempt.
    #[must_use]
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    /// Policy that retries until the operation succeeds.
    #[must_use]
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// Total attempt budget, or `None` when unbounded.
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay between consecutive attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. `on_retry` is called with the
    /// failed attempt number and its error right before the policy sleeps.
    /// The delay is never applied after the final attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        mut on_retry: impl FnMut(u32, &E),
    ) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.allows_retry_after(attempt) {
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: error,
                        });
                    }
                    on_retry(attempt, &error);
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
