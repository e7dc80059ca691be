use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;

use crate::address::AddressError;
use crate::repository::RepositoryError;
use crate::source::SourceError;

/// Errors that end a sync cycle or prevent a job from starting.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching from the external feed failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A repository call failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Opening or committing the batch transaction failed.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A storage operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The shutdown token fired mid-cycle.
    #[error("Sync cancelled")]
    Cancelled,

    /// A change points at an address that is not indexed yet.
    #[error("Unknown address: {address}")]
    UnknownAddress { address: String },

    /// More than one address row shares the same hash.
    #[error("Address {address} matches {count} rows")]
    AmbiguousAddress { address: String, count: usize },

    /// A change carries an address that does not decode.
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// The stored checkpoint cannot be read as this job's position type.
    #[error("Checkpoint '{job}' holds invalid position {position}: {message}")]
    InvalidPosition {
        job: String,
        position: i64,
        message: String,
    },
}

impl SyncError {
    /// True for failures that may go away on the next cycle without anyone
    /// intervening.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Source(e) => e.is_transient(),
            Self::Timeout { .. } => true,
            _ => self.is_retryable_db(),
        }
    }

    /// True for storage failures worth re-running the whole transaction for.
    pub fn is_retryable_db(&self) -> bool {
        match self {
            Self::Database(e) | Self::Repository(RepositoryError::Database(e)) => {
                is_retryable_db_error(e)
            }
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked, busy
            // PostgreSQL: connection refused, too many connections
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
