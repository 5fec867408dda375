//! Shared retry policy for provider gateway calls.
//!
//! Both gateway clients route every HTTP call through this policy: up to
//! 3 attempts total on HTTP 5xx / 429 or transport failures, exponential
//! backoff starting at 1s, doubling, capped at 10s. Other 4xx responses are
//! permanent client errors and fail immediately. Worst-case total sleep is
//! bounded so a serverless invocation cannot hang indefinitely.

use std::future::Future;
use std::time::Duration;

use crate::ports::GatewayError;

/// Retry policy parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        exp.min(self.max_delay)
    }

    /// Runs `operation` under this policy. The closure receives the 1-based
    /// attempt number; on exhaustion the last error is returned.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying gateway call after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "Gateway call failed after exhausting retries"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .execute("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, GatewayError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persistent_503_is_called_exactly_three_times_then_raises() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .execute("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::provider(503, "unavailable")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .execute("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(GatewayError::provider(429, "slow down"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .execute("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::provider(400, "bad request")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .execute("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::Transport("reset".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };

        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        // Capped at 10s.
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }
}
