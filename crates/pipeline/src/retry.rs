//! Composable retry policy.
//!
//! A [`RetryStrategy`] bundles the attempt bound and back-off schedule. The
//! retryable-error predicate is supplied by the error type through
//! [`Retryable`]. The same executor drives both asset fetching and external
//! collaborator calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Clock, RetryPolicy, Retryable};

/// Attempt bound and exponential back-off schedule.
///
/// Attempt `n` (1-based) that fails with a retryable error is followed by a
/// delay of `initial_backoff * multiplier^(n-1)`, capped at `max_backoff`.
/// A server-suggested delay (`RetryPolicy::Retryable { after: Some(_) }`)
/// takes precedence when it is longer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Retries after the first attempt. Total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied after each further failure.
    pub multiplier: u32,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl RetryStrategy {
    /// A strategy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            multiplier: 1,
            max_backoff: Duration::ZERO,
        }
    }

    /// Exponential doubling from `initial_backoff`, each delay capped at five minutes.
    pub fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            multiplier: 2,
            max_backoff: Duration::from_secs(300),
        }
    }

    /// Returns the delay to wait after the `failed_attempt`-th failure (1-based).
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the strategy's retries are spent.
///
/// `operation` receives the 1-based attempt number. Non-retryable errors are
/// returned immediately without sleeping.
pub async fn retry_with_backoff<T, E, F, Fut>(
    strategy: &RetryStrategy,
    clock: &dyn Clock,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let suggested = match error.retry_policy() {
            RetryPolicy::NonRetryable => return Err(error),
            RetryPolicy::Retryable { after } => after,
        };
        if attempt > strategy.max_retries {
            return Err(error);
        }

        let mut delay = strategy.backoff_for(attempt);
        if let Some(after) = suggested {
            delay = delay.max(after);
        }
        warn!(
            operation = label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, will retry"
        );
        clock.sleep(delay).await;
    }
}
