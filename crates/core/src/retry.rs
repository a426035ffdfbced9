//! Reusable bounded-retry policy with exponential backoff.
//!
//! Transient infrastructure failures (transaction conflicts, deadlocks,
//! timeouts) are retried a fixed number of times; everything else surfaces
//! immediately. The caller supplies the retryable-error predicate so the
//! policy stays agnostic of the error type.

use std::future::Future;
use std::time::Duration;

/// Default attempts for the version-allocation transaction.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default first backoff delay; doubles per subsequent attempt
/// (100ms, 200ms, 400ms).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// A bounded exponential-backoff retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails non-retryably, or exhausts attempts.
    ///
    /// `is_retryable` classifies errors; a non-retryable error is returned
    /// without sleeping. The final retryable error is returned after the
    /// last attempt.
    pub async fn run<T, E, F, Fut, P>(&self, is_retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
