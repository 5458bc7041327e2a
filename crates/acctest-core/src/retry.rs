//! Bounded retry with exponential backoff
//!
//! The reader never retries. Assertions that expect eventual consistency wrap
//! their lookups in a [`RetryPolicy`] instead.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 means no retry
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_backoff_ms: u64,
    /// Growth factor between delays
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Single evaluation, no retry
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Exponential backoff with the given attempts and first delay
    #[inline]
    #[must_use]
    pub fn exponential(max_attempts: u32, initial_backoff: Duration) -> Self {
        let initial = u64::try_from(initial_backoff.as_millis()).unwrap_or(u64::MAX);
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms: initial,
            max_backoff_ms: initial.saturating_mul(16),
            multiplier: 2.0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent))
            .min(self.max_backoff_ms.max(self.initial_backoff_ms) as f64) as u64;
        Duration::from_millis(millis)
    }

    /// Run `op` until `should_retry` rejects its output or attempts run out
    ///
    /// Returns the last output together with the number of attempts made.
    pub async fn run<T, F, Fut, P>(&self, mut op: F, should_retry: P) -> (T, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let output = op().await;
            if attempt >= max || !should_retry(&output) {
                return (output, attempt);
            }
            let delay = self.backoff_after(attempt);
            tracing::debug!(attempt, ?delay, "retrying after backoff");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
