//! Retry with backoff for transient request failures
//!
//! The policy is shared by every HTTP call site through the fetch client, so
//! callers only ever see the final outcome.

use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HttpConfig;

/// Final error of a retried operation
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    /// Attempts made, including the first
    pub attempts: u32,
    /// True when the last error was transient and the attempt budget ran out
    pub exhausted: bool,
}

/// Retry helper with configurable backoff
#[derive(Debug, Clone)]
pub struct RetryHelper {
    config: HttpConfig,
    retry_status_codes: HashSet<u16>,
}

impl RetryHelper {
    /// Create a new retry helper from config
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            config: config.clone(),
            retry_status_codes: config.retry_status_codes.iter().copied().collect(),
        }
    }

    /// Whether an HTTP status belongs to the retryable set
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }

    /// Execute an async operation, retrying errors for which `is_transient` holds.
    ///
    /// Non-transient errors are returned after the attempt that produced them.
    pub async fn with_retry<T, E, F, Fut, P>(&self, operation: F, is_transient: P) -> Result<T, RetryFailure<E>>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !is_transient(&e) => {
                    return Err(RetryFailure { error: e, attempts: attempt, exhausted: false });
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!("All {} attempts exhausted, giving up: {}", max_attempts, e);
                        return Err(RetryFailure { error: e, attempts: attempt, exhausted: true });
                    }

                    let delay = self.config.calculate_backoff_delay(attempt + 1);
                    debug!("Attempt {} failed ({}), retrying in {:?}", attempt, e, delay);

                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(max_attempts: u32) -> HttpConfig {
        HttpConfig {
            request_timeout_secs: 1,
            max_attempts,
            backoff_factor: 0.0,
            max_backoff_secs: 0,
            retry_status_codes: vec![500, 502, 503, 504],
        }
    }

    #[test]
    fn test_retryable_status_set() {
        let helper = RetryHelper::new(&config(5));
        assert!(helper.is_retryable_status(503));
        assert!(!helper.is_retryable_status(404));
        assert!(!helper.is_retryable_status(200));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let helper = RetryHelper::new(&config(5));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<u32, RetryFailure<String>> = helper
            .with_retry(
                move || async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 { Err(format!("transient {}", n)) } else { Ok(n) }
                },
                |_| true,
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let helper = RetryHelper::new(&config(4));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), RetryFailure<String>> = helper
            .with_retry(
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("always".to_string())
                },
                |_| true,
            )
            .await;

        let failure = result.unwrap_err();
        assert!(failure.exhausted);
        assert_eq!(failure.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let helper = RetryHelper::new(&config(5));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), RetryFailure<String>> = helper
            .with_retry(
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("not found".to_string())
                },
                |_| false,
            )
            .await;

        let failure = result.unwrap_err();
        assert!(!failure.exhausted);
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
