//! Shared retry utilities.
//!
//! Batch commits retry lock contention and lost connections with exponential
//! backoff. Source fetches do not retry here: a failed fetch abandons the
//! cycle and the next tick asks again from the same checkpoint.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

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

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Short, tight backoff for lock contention on batch commits.
    #[must_use]
    pub fn database() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(2), 3)
    }

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

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or `config.max_retries` retries are spent.
///
/// Every retry is logged at warn level with the `operation` label.
///
/// # Example
///
/// ```ignore
/// let applied = with_retry(
///     || apply_batch(db, job, batch, position),
///     SyncError::is_retryable_db,
///     RetryConfig::database(),
///     "price-feed",
/// )
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    is_retryable: IsRetryable,
    config: RetryConfig,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    IsRetryable: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.into_backoff())
        .notify(|err, dur| {
            tracing::warn!(
                operation = label,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
        })
        .when(is_retryable)
        .await
}
