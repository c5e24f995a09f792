//! Exponential backoff with jitter.
//!
//! Used for every Temu API call and for the vision-LLM text detector. The
//! delay before retry `n` is `initial × multiplier^(n-1)`, capped at
//! `max_delay`, then spread by ±`jitter` so that a batch of listings that hit
//! a rate limit together do not all come back at the same instant.
//!
//! With the defaults (1 s, ×2, 3 retries) the waits are roughly
//! 1 s → 2 s → 4 s.

use crate::config::ListingConfig;
use crate::error::ListingError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;
use tracing::warn;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `0` behaves like `1`.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy derived from the API retry settings of a listing config.
    pub fn from_config(config: &ListingConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            initial_delay: Duration::from_millis(config.retry_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            multiplier: 2.0,
            jitter: config.retry_jitter,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };

        Duration::from_secs_f64((capped * factor).min(self.max_delay.as_secs_f64()).max(0.0))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Abort,
}

/// Run `operation` until it succeeds, `classify` aborts, or attempts run out.
///
/// `operation` receives the 1-based attempt number. The error of the last
/// attempt is returned unchanged so callers can still inspect API codes.
pub async fn retry_with_backoff<T, F, Fut, C>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    mut classify: C,
) -> Result<T, ListingError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ListingError>>,
    C: FnMut(&ListingError) -> RetryDisposition,
{
    let max = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if classify(&err) == RetryDisposition::Abort || attempt >= max {
                    return Err(err);
                }
                let backoff = policy.delay_for(attempt);
                warn!(
                    call = label,
                    attempt,
                    max_attempts = max,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                if backoff.is_zero() {
                    yield_now().await;
                } else {
                    sleep(backoff).await;
                }
            }
        }
    }
}
