//! Bounded retry with linear backoff
//!
//! Attempt N (1-based) that fails with a retryable error waits `N * base_delay`
//! before attempt N+1. No sleep follows the final attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::models::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one; 0 is treated as 1
    pub max_attempts: u32,
    /// Linear backoff base
    pub base_delay: Duration,
    /// Random jitter (±percent) applied to each delay
    pub jitter_percent: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::utils::constants::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(crate::utils::constants::DEFAULT_BACKOFF_BASE_MS),
            jitter_percent: 0,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the given failed attempt, before jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Delay after the given failed attempt, jitter applied
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay_for(attempt).as_millis() as u64;
        if self.jitter_percent == 0 || base_ms == 0 {
            return Duration::from_millis(base_ms);
        }
        let jitter_range = (base_ms * self.jitter_percent.min(100) / 100) as i64;
        let jitter: i64 = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis((base_ms as i64 + jitter).max(0) as u64)
    }
}

/// Failure after retries, with the number of attempts actually made
#[derive(Debug)]
pub struct RetryError {
    pub error: AppError,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. `op` receives the 1-based attempt number.
///
/// Returns the value together with the attempt that produced it.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<(T, u32), RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max = policy.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) if !error.is_retryable() || attempt >= max => {
                return Err(RetryError {
                    error,
                    attempts: attempt,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    "⏳ Attempt {}/{} failed ({}), retrying in {}ms",
                    attempt,
                    max,
                    error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
