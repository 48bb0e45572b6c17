use crate::domain::errors::ApiError;
use crate::domain::models::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for transient API errors
///
/// `max_attempts` counts every call, the first one included. The delay after
/// failed attempt `n` (1-based) is `base * 2^(n-1)`, clamped to
/// `[base, max]`. Only errors for which [`ApiError::is_transient`] holds are
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// `max_attempts` below 1 is raised to 1 and a ceiling below the floor is
    /// raised to the floor.
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max: backoff_max.max(backoff_base),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.backoff_base.saturating_mul(1u32 << exponent);
        delay.clamp(self.backoff_base, self.backoff_max)
    }

    /// Whether failed attempt `attempt` (1-based) should be followed by another.
    pub const fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Execute an operation, retrying transient failures with backoff
    ///
    /// # Returns
    /// * `Ok(T)` - Operation succeeded
    /// * `Err(ApiError)` - Permanent error, or the last transient error once
    ///   attempts are exhausted
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.delay_for(attempt);
                        warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "transient error, retrying"
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if err.is_transient() {
                            warn!(attempts = attempt, error = %err, "retries exhausted");
                        } else {
                            debug!(error = %err, "permanent error, not retrying");
                        }
                        return Err(err);
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
