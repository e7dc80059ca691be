//! Atomic batch application.
//!
//! A batch and the checkpoint that covers it are written in one transaction.
//! A crash between fetch and commit loses nothing: the checkpoint was not
//! moved, so the next cycle fetches the same page again and the idempotent
//! upserts absorb the replay.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::repository::sync_state;
use crate::retry::with_retry;

use super::errors::{Result, SyncError};
use super::job::SyncJob;
use super::position::SyncPosition;
use super::types::SyncConfig;

/// Persist `batch` and advance the job's checkpoint to `position`, all or
/// nothing.
///
/// # Returns
/// Number of rows the job reported as inserted or updated.
pub async fn apply_batch<J: SyncJob>(
    db: &DatabaseConnection,
    job: &J,
    batch: &[J::Record],
    position: J::Position,
) -> Result<u64> {
    let tx = db.begin().await?;

    match write(&tx, job, batch, position).await {
        Ok(applied) => {
            tx.commit().await?;
            Ok(applied)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(job = job.name(), error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn write<J: SyncJob>(
    tx: &DatabaseTransaction,
    job: &J,
    batch: &[J::Record],
    position: J::Position,
) -> Result<u64> {
    let applied = job.persist(tx, batch).await?;
    sync_state::advance(tx, job.name(), position.to_stored()).await?;
    Ok(applied)
}

/// [`apply_batch`] under `config.db_timeout`, re-running the whole
/// transaction on lock contention or a lost connection.
pub async fn apply_with_retry<J: SyncJob>(
    db: &DatabaseConnection,
    job: &J,
    batch: &[J::Record],
    position: J::Position,
    config: &SyncConfig,
) -> Result<u64> {
    let after = config.db_timeout;

    with_retry(
        move || async move {
            tokio::time::timeout(after, apply_batch(db, job, batch, position))
                .await
                .map_err(|_| SyncError::Timeout {
                    operation: "batch commit",
                    after,
                })?
        },
        SyncError::is_retryable_db,
        config.commit_retry.clone(),
        job.name(),
    )
    .await
}
