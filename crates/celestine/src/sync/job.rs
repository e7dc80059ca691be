use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction};

use super::errors::Result;
use super::position::SyncPosition;

/// One resumable feed: where it starts, how it pages, how it is stored.
///
/// The engine owns the checkpoint and drives the cycle; a job only knows
/// its source and its tables.
#[async_trait]
pub trait SyncJob: Send + Sync {
    type Position: SyncPosition;
    /// Natural key of a record; the writer upserts on it.
    type Key: Eq + Hash + Send;
    type Record: Clone + Send + Sync;

    /// Checkpoint name. Unique per job.
    fn name(&self) -> &str;

    /// Requested page size. A page this long means more data is waiting.
    fn page_limit(&self) -> usize;

    /// Position to start from when no checkpoint has been stored yet.
    async fn initial_position(&self, db: &DatabaseConnection) -> Result<Self::Position>;

    /// Bound passed to [`fetch`](SyncJob::fetch) given the last committed
    /// position. Sources with an inclusive lower bound step past the
    /// checkpoint here.
    fn lower_bound(&self, checkpoint: Self::Position) -> Self::Position;

    /// Fetch at most [`page_limit`](SyncJob::page_limit) records from `from`.
    async fn fetch(&self, from: Self::Position) -> Result<Vec<Self::Record>>;

    fn key_of(&self, record: &Self::Record) -> Self::Key;

    fn position_of(&self, record: &Self::Record) -> Self::Position;

    /// Upsert `records` on `tx`. Must be idempotent on the natural key.
    ///
    /// # Returns
    /// Number of rows inserted or updated.
    async fn persist(&self, tx: &DatabaseTransaction, records: &[Self::Record]) -> Result<u64>;
}

/// Drop all but the last record for each natural key, keeping page order.
///
/// One `INSERT .. ON CONFLICT DO UPDATE` may not touch the same row twice.
pub fn dedup_last_wins<J: SyncJob>(job: &J, records: Vec<J::Record>) -> Vec<J::Record> {
    let mut last: HashMap<J::Key, usize> = HashMap::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        last.insert(job.key_of(record), idx);
    }

    if last.len() == records.len() {
        return records;
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(idx, record)| last.get(&job.key_of(record)) == Some(idx))
        .map(|(_, record)| record)
        .collect()
}
