//! Exponential backoff for calls to the data store and the embedding model

use crate::error::EngineError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Add up to 30% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64, jitter: bool) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter,
        }
    }

    /// Single attempt, used by tests and one-shot jobs
    pub fn none() -> Self {
        Self::new(0, 0, 0, false)
    }

    /// Delay before retry number `attempt` (0-indexed): `min(base * 2^attempt, max)`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay_ms);

        let jitter = if self.jitter {
            let range = (capped as f64 * 0.3) as u64;
            if range > 0 {
                rand::thread_rng().gen_range(0..=range)
            } else {
                0
            }
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// policy is exhausted
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut operation: F,
    policy: RetryPolicy,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= policy.max_retries {
                    if policy.max_retries > 0 {
                        tracing::warn!(
                            attempts = attempt + 1,
                            "All retry attempts exhausted"
                        );
                    }
                    return Err(error);
                }
                if !is_retryable(&error) {
                    return Err(error);
                }

                let delay = policy.calculate_delay(attempt);
                tracing::debug!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after delay"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// [`retry_with_backoff`] using [`EngineError::is_retryable`]
pub async fn retry_engine<F, Fut, T>(operation: F, policy: RetryPolicy) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    retry_with_backoff(operation, policy, EngineError::is_retryable).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_calculate_delay_exponential_progression() {
        let policy = RetryPolicy::new(5, 100, 10000, false);
        let delays: Vec<u128> = (0..5).map(|a| policy.calculate_delay(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn test_calculate_delay_max_cap() {
        let policy = RetryPolicy::new(10, 100, 500, false);
        assert_eq!(policy.calculate_delay(5).as_millis(), 500);
        assert_eq!(policy.calculate_delay(10).as_millis(), 500);
    }

    #[test]
    fn test_calculate_delay_with_jitter() {
        let policy = RetryPolicy::new(3, 1000, 5000, true);
        let delay_ms = policy.calculate_delay(0).as_millis();
        assert!((1000..=1300).contains(&delay_ms));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_backoff(
            || {
                let c = counter_clone.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("temporary failure")
                    } else {
                        Ok("success")
                    }
                }
            },
            RetryPolicy::new(5, 1, 10, false),
            |_: &&str| true,
        )
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_backoff(
            || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("persistent failure")
                }
            },
            RetryPolicy::new(3, 1, 10, false),
            |_: &&str| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "persistent failure");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_engine_error_not_retryable_fails_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_engine(
            || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(EngineError::InvalidArgument("empty query".into()))
                }
            },
            RetryPolicy::new(3, 1, 10, false),
        )
        .await;

        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_engine_error_upstream_is_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_engine(
            || {
                let c = counter_clone.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(EngineError::Embedding("503".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
            RetryPolicy::new(2, 1, 10, false),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
