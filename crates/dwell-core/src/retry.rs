//! Page-level retry with exponential backoff
//!
//! Only errors that report themselves retryable are retried; a schema
//! mismatch or an unreachable source fails fast so the orchestrator can react.

use crate::error::SourceError;
use std::future::Future;
use std::time::Duration;

/// Errors that may succeed when the same request is repeated
pub trait Retryable {
    /// Check if the request may be repeated as-is
    fn is_retryable(&self) -> bool;
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        SourceError::is_retryable(self)
    }
}

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between delays
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub const NONE: Self = Self {
        max_attempts: 1,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 1.0,
    };

    /// Delay to wait after failed attempt `attempt` (1-based)
    ///
    /// `None` once attempts are exhausted.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if secs >= self.max_delay.as_secs_f64() {
            return Some(self.max_delay);
        }
        Some(Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// `operation` receives the 1-based attempt number.
///
/// # Errors
/// Returns the last error once it is not retryable or attempts are exhausted
pub async fn retry_with_policy<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_retryable() => {
                tracing::debug!(attempt, %error, "non-retryable failure");
                return Err(error);
            }
            Err(error) => match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::warn!(attempt, %error, "retry attempts exhausted");
                    return Err(error);
                }
            },
        }
    }
}
