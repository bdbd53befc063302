//! Shared retry utilities.
//!
//! Used for transient failures only: database lock contention on bulk upserts
//! and retryable job failures in the worker pool. Rate limiting is not retried
//! here; the enricher turns it into a reschedule instead.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 10_000;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// A configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0)
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Build the default exponential backoff strategy.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}

/// Execute an operation, retrying errors accepted by `is_retryable`.
///
/// Each retry is logged at warn level with the attempt number and delay.
///
/// # Example
///
/// ```ignore
/// let rows = with_retry(
///     || repository::upsert_many(db, rows.clone(), on_conflict.clone()),
///     RepositoryError::is_transient,
///     &RetryConfig::default(),
///     "commit upsert",
/// )
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    is_retryable: IsRetryable,
    config: &RetryConfig,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    IsRetryable: FnMut(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .when(is_retryable)
        .notify(|err, dur| {
            tracing::warn!(
                operation = label,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
        })
        .await
}
