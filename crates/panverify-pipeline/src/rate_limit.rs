//! Minimum-interval pacing of verification calls.

use std::time::Duration;
use tokio::time::Instant;

/// Strictly serial rate limiter.
///
/// The first [`RateLimiter::acquire`] returns immediately; every later one
/// waits until `interval` has passed since the previous call was let through.
/// There is no burst allowance.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot and claim it.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}
