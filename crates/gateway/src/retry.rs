use rand::Rng;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::debug;

use screening_core::config::RetryConfig;

use crate::provider::ProviderFailure;

/// Exponential backoff retry policy for provider calls.
///
/// Delay for attempt `n` (1-based) is `initial * base^(n-1)`, capped at
/// `max_delay`, multiplied by a jitter factor in [0.5, 1.5). Only failures
/// classified transient or temporary are retried; a server-suggested
/// `retry_after` overrides the computed delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Backoff delay before retrying after the given (1-based) attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base_delay =
            self.config.initial_delay_ms as f64 * self.config.backoff_base.powi(exponent as i32);
        let capped = base_delay.min(self.config.max_delay_ms as f64);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_millis((capped * jitter) as u64)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts are
    /// exhausted. Returns the last failure when exhausted.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, ProviderFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = failure
                        .retry_after()
                        .unwrap_or_else(|| self.delay_for_attempt(attempt));
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        failure = %failure,
                        "Retrying provider call"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            initial_delay_ms: 10,
            backoff_base: 2.0,
            max_delay_ms: 100,
        })
    }

    #[test]
    fn delay_grows_exponentially_within_bounds() {
        let policy = policy(5);
        // Jitter is [0.5, 1.5), so bound checks use the scaled envelope.
        let first = policy.delay_for_attempt(1).as_millis() as f64;
        assert!((5.0..15.0).contains(&first), "first delay {}", first);

        let third = policy.delay_for_attempt(3).as_millis() as f64;
        assert!((20.0..60.0).contains(&third), "third delay {}", third);

        // Capped at max_delay * 1.5.
        let tenth = policy.delay_for_attempt(10).as_millis() as f64;
        assert!(tenth < 150.0, "capped delay {}", tenth);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_to_success() {
        let policy = policy(3);
        let calls = AtomicU32::new(0);

        let result = policy
            .execute(|_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderFailure::timeout("slow upstream"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let policy = policy(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderFailure::new(FailureKind::InvalidRequest, "bad params")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_exhausted_with_last_failure() {
        let policy = policy(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderFailure::unavailable("down")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result.unwrap_err().kind,
            FailureKind::ServiceUnavailable
        );
    }
}
