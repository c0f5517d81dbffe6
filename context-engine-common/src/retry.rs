//! Unified retry utilities for consistent error handling across all crates.

use crate::error::LlamaError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Trait for errors that can be classified for retry behavior.
pub trait RetryableError: std::error::Error + Send + Sync {
    fn is_retriable(&self) -> bool;

    fn custom_retry_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn should_stop_retrying(&self, _attempt: u32) -> bool {
        false
    }
}

impl<T: LlamaError> RetryableError for T {
    fn is_retriable(&self) -> bool {
        LlamaError::is_retriable(self)
    }

    fn custom_retry_delay(&self, attempt: u32) -> Option<Duration> {
        LlamaError::custom_retry_delay(self, attempt)
    }

    fn should_stop_retrying(&self, attempt: u32) -> bool {
        LlamaError::should_stop_retrying(self, attempt)
    }
}

/// Executes an operation with exponential backoff, bounded by a small fixed
/// number of attempts, per the engine's "retry transient provider/storage
/// failures, never hide invariant violations" propagation policy.
pub struct RetryManager {
    config: RetryConfig,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryManager {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn retry<F, T, E, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let mut delay = self.config.initial_delay;
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if !err.is_retriable()
                        || attempt > self.config.max_retries
                        || err.should_stop_retrying(attempt)
                    {
                        warn!(operation = operation_name, attempt, "giving up after retry");
                        return Err(err);
                    }

                    let wait = err.custom_retry_delay(attempt).unwrap_or(delay);
                    info!(
                        operation = operation_name,
                        attempt,
                        delay_ms = wait.as_millis() as u64,
                        "retrying after failure"
                    );
                    sleep(wait).await;
                    delay = std::cmp::min(
                        Duration::from_secs_f64(delay.as_secs_f64() * self.config.backoff_multiplier),
                        self.config.max_delay,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("transient")]
    struct TransientError;

    impl LlamaError for TransientError {
        fn category(&self) -> ErrorCategory {
            ErrorCategory::External
        }
        fn error_code(&self) -> &'static str {
            "TEST_TRANSIENT"
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let manager = RetryManager::with_config(RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(5),
        });

        let mut attempts = 0;
        let result: Result<u32, TransientError> = manager
            .retry("test", || {
                attempts += 1;
                async move {
                    if attempts < 3 {
                        Err(TransientError)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let manager = RetryManager::with_config(RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(5),
        });

        let result: Result<u32, TransientError> =
            manager.retry("test", || async { Err(TransientError) }).await;

        assert!(result.is_err());
    }
}
