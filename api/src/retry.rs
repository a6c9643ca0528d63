//! Shared retry-with-backoff abstraction: exponential backoff with jitter,
//! wrapping any fallible future behind a caller-supplied retryability check.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::CoreError;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay, max_delay: Duration::from_secs(30), jitter: Duration::from_millis(250) }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = scaled.min(self.max_delay);
        let jitter_ms: u64 = if self.jitter.is_zero() {
            0
        } else {
            rand::rng().random_range(0..=self.jitter.as_millis() as u64)
        };
        capped + Duration::from_millis(jitter_ms)
    }

    /// Runs `op` until it succeeds, the retryable predicate says to stop, or
    /// `max_attempts` is exhausted. `is_retryable` decides whether a given
    /// error should be retried at all (permanent errors fail fast).
    pub async fn run<T, F, Fut>(
        &self,
        mut op: F,
        is_retryable: impl Fn(&CoreError) -> bool,
    ) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt as usize + 1 >= self.max_attempts || !is_retryable(&e) => {
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, error = %e, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let policy = RetryPolicy { jitter: Duration::ZERO, base_delay: Duration::from_millis(1), ..RetryPolicy::default() };
        let attempts = AtomicUsize::new(0);
        let result = policy
            .run(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err(CoreError::Transient("boom".into())) } else { Ok(42) }
                },
                CoreError::is_retryable,
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let policy = RetryPolicy { jitter: Duration::ZERO, base_delay: Duration::from_millis(1), ..RetryPolicy::default() };
        let attempts = AtomicUsize::new(0);
        let result: Result<(), CoreError> = policy
            .run(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::Permanent("nope".into()))
                },
                CoreError::is_retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let policy = RetryPolicy { max_attempts: 2, jitter: Duration::ZERO, base_delay: Duration::from_millis(1), ..RetryPolicy::default() };
        let attempts = AtomicUsize::new(0);
        let result: Result<(), CoreError> = policy
            .run(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::Transient("boom".into()))
                },
                CoreError::is_retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
