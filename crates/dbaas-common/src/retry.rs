//! Bounded retry with exponential backoff and jitter.
//!
//! Used for optimistic-concurrency writes: a read-modify-write that loses a
//! race on `resourceVersion` is retried a small number of times with a fresh
//! read, and only errors the caller classifies as retryable are retried.
//!
//! # Example
//!
//! ```ignore
//! use dbaas_common::retry::{retry_with_backoff, RetryConfig};
//!
//! let record = retry_with_backoff(
//!     &RetryConfig::with_max_attempts(5),
//!     "patch_wipe_out",
//!     Error::is_conflict,
//!     || async { store.read_modify_write(ns, name).await },
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0, // infinite
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Override the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Execute an async operation, retrying errors accepted by `should_retry`.
///
/// Errors rejected by `should_retry` are returned immediately. When
/// `max_attempts` is exhausted the last error is returned.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `should_retry` - Classifies which errors are transient
/// * `operation` - The async operation to retry
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => {
                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                // Add jitter: 0.5x to 1.5x of the delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = jittered_delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(jittered_delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn always(_: &&str) -> bool {
        true
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_immediately() {
        let config = RetryConfig::with_max_attempts(3);
        let result: Result<i32, &str> =
            retry_with_backoff(&config, "op", always, || async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let config = RetryConfig::with_max_attempts(5);

        let result: Result<u32, &str> = retry_with_backoff(&config, "op", always, || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("stale resourceVersion")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let config = RetryConfig::with_max_attempts(4);

        let result: Result<(), &str> = retry_with_backoff(&config, "op", always, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("conflict")
            }
        })
        .await;

        assert_eq!(result, Err("conflict"));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let config = RetryConfig::with_max_attempts(10);

        let result: Result<(), &str> =
            retry_with_backoff(&config, "op", |e: &&str| *e == "conflict", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("forbidden")
                }
            })
            .await;

        assert_eq!(result, Err("forbidden"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_builder_overrides_delay() {
        let config = RetryConfig::with_max_attempts(5).initial_delay(Duration::from_millis(50));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(50));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }
}
