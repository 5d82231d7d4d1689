//! Retry policy for provider HTTP calls.
//!
//! The schedule is pure data so it can be unit tested without a clock:
//! exponential backoff between attempts, geometric per-attempt timeout
//! growth, both capped.

use std::time::Duration;

/// Retry schedule for transient backend failures.
///
/// Only 5xx responses, timeouts, and connection errors are retried; the
/// caller checks [`cobalt_abstraction::ProviderError::is_retryable`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the inter-attempt delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// Multiplier applied to the per-attempt timeout after each attempt.
    pub timeout_multiplier: f64,
    /// Upper bound for the per-attempt timeout.
    pub max_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            timeout_multiplier: 1.5,
            max_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts, the first one included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to sleep before retrying after the given zero-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }

    /// Per-attempt timeout, growing geometrically from `base_timeout`.
    #[must_use]
    pub fn timeout_for(&self, base_timeout: Duration, attempt: u32) -> Duration {
        let factor = self.timeout_multiplier.powi(attempt as i32);
        let timeout = base_timeout.mul_f64(factor);
        timeout.min(self.max_timeout)
    }
}
