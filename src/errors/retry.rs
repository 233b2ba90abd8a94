use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use super::classification::ErrorClassification;
use super::types::QuorumError;
use tracing::{debug, warn};

impl ErrorClassification {
    /// Delay before retry `attempt` (0-indexed). Rate limits wait 5s more per
    /// attempt up to 20s; everything else backs off 2^attempt seconds plus up
    /// to 1s of jitter, capped at 10s.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        match self.error_type {
            "RateLimitError" => {
                let secs = 5 + (attempt as u64 * 5);
                Duration::from_secs(secs.min(20))
            }
            _ => {
                let base: f64 = 2.0_f64.powi(attempt as i32);
                let jitter: f64 = rand::random::<f64>();
                Duration::from_secs_f64((base + jitter).min(10.0))
            }
        }
    }
}

/// Retry policy for agent calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

/// Run `factory` until it succeeds, the error is not retryable, retries run
/// out, or the next backoff would end past `deadline`. The last error is
/// returned as-is so callers see why the call failed rather than a timeout.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    deadline: Option<Instant>,
    mut factory: F,
) -> Result<T, QuorumError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QuorumError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        let err = match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        attempt += 1;

        let classification = err.classify();
        if !classification.retryable {
            debug!(
                operation = operation_name,
                error_type = classification.error_type,
                "Non-retryable error"
            );
            return Err(err);
        }
        if attempt >= max_attempts {
            warn!(operation = operation_name, attempts = attempt, "Retries exhausted");
            return Err(err);
        }

        let delay = classification.retry_delay(attempt - 1);
        if deadline.is_some_and(|d| Instant::now() + delay >= d) {
            warn!(
                operation = operation_name,
                error_type = classification.error_type,
                delay_ms = delay.as_millis() as u64,
                "Backoff would overrun the call deadline, giving up"
            );
            return Err(err);
        }

        warn!(
            operation = operation_name,
            attempt,
            max = max_attempts,
            error_type = classification.error_type,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after error"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting(
        attempts: &Arc<AtomicU32>,
        err: fn() -> QuorumError,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<(), QuorumError>> + Send>> {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(err())
            })
        }
    }

    #[test]
    fn test_retry_delay_rate_limit() {
        let class = ErrorClassification { error_type: "RateLimitError", retryable: true };
        assert_eq!(class.retry_delay(0), Duration::from_secs(5));
        assert_eq!(class.retry_delay(1), Duration::from_secs(10));
        assert_eq!(class.retry_delay(9), Duration::from_secs(20));
    }

    #[test]
    fn test_retry_delay_default_exponential() {
        let class = ErrorClassification { error_type: "NetworkError", retryable: true };
        let d1 = class.retry_delay(1);
        assert!(d1.as_secs_f64() >= 2.0 && d1.as_secs_f64() < 3.0);
        assert!(class.retry_delay(12).as_secs_f64() <= 10.0);
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_first_try() {
        let result = with_retry("test", &RetryConfig { max_retries: 3 }, None, || async {
            Ok::<_, QuorumError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let result = with_retry(
            "test",
            &RetryConfig { max_retries: 3 },
            None,
            counting(&attempts, || QuorumError::Authentication("bad key".into())),
        )
        .await;
        assert!(matches!(result, Err(QuorumError::Authentication(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let result = with_retry(
            "test",
            &RetryConfig { max_retries: 2 },
            None,
            counting(&attempts, || QuorumError::Network("connection reset".into())),
        )
        .await;
        assert!(matches!(result, Err(QuorumError::Network(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_past_deadline_returns_original_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let deadline = Instant::now() + Duration::from_secs(1);
        let result = with_retry(
            "test",
            &RetryConfig { max_retries: 3 },
            Some(deadline),
            counting(&attempts, || QuorumError::RateLimit("429".into())),
        )
        .await;
        assert!(matches!(result, Err(QuorumError::RateLimit(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
