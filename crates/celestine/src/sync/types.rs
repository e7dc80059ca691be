//! Engine configuration and cycle bookkeeping.

use std::fmt;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Time between cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Pause between full pages while draining a backlog.
pub const DEFAULT_DRAIN_DELAY: Duration = Duration::from_millis(200);

/// Deadline for one batch transaction.
pub const DEFAULT_DB_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine settings shared by every job.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between cycle starts. Zero means [`DEFAULT_SYNC_INTERVAL`].
    pub interval: Duration,
    /// Pause between full pages. Zero disables the pause.
    pub drain_delay: Duration,
    /// Deadline for one batch transaction. Zero means [`DEFAULT_DB_TIMEOUT`].
    pub db_timeout: Duration,
    /// Backoff for re-running a batch transaction that hit lock contention.
    pub commit_retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            drain_delay: DEFAULT_DRAIN_DELAY,
            db_timeout: DEFAULT_DB_TIMEOUT,
            commit_retry: RetryConfig::database(),
        }
    }
}

impl SyncConfig {
    /// Replace zero durations that would stall the engine with defaults.
    #[must_use]
    pub fn validated(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = DEFAULT_SYNC_INTERVAL;
        }
        if self.db_timeout.is_zero() {
            self.db_timeout = DEFAULT_DB_TIMEOUT;
        }
        self
    }
}

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Fetching,
    Applying,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Applying => "applying",
        })
    }
}

/// Outcome of one [`tick`](super::SyncEngine::tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport<P> {
    /// Fetch calls issued, including the final short or empty one.
    pub fetches: usize,
    /// Rows inserted or updated across all batches.
    pub applied: u64,
    /// Checkpoint after the cycle.
    pub position: P,
}
