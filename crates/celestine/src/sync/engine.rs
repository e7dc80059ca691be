//! Resumable sync loop.
//!
//! ```text
//! run:   wait {tick, cancel} -> tick -> wait ...
//! tick:  fetch(lower_bound(checkpoint)) -> apply -> advance
//!          page full?  pause, fetch again
//!          otherwise   Idle
//! ```
//!
//! The ticker is only polled between ticks, so cycles of one job never
//! overlap. Each engine owns its checkpoint; jobs never share one.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::repository::sync_state;

use super::errors::{Result, SyncError};
use super::job::{SyncJob, dedup_last_wins};
use super::position::SyncPosition;
use super::types::{CycleReport, EngineState, SyncConfig};
use super::writer;

/// Drives one [`SyncJob`] against the database.
pub struct SyncEngine<J: SyncJob> {
    db: Arc<DatabaseConnection>,
    job: J,
    config: SyncConfig,
    checkpoint: J::Position,
    state: EngineState,
}

impl<J: SyncJob> SyncEngine<J> {
    /// Load (or create) the job's checkpoint and return a ready engine.
    ///
    /// # Errors
    /// Any storage error other than "no checkpoint yet" is returned and the
    /// job does not start.
    pub async fn start(db: Arc<DatabaseConnection>, job: J, config: SyncConfig) -> Result<Self> {
        let config = config.validated();

        let stored = match sync_state::load(db.as_ref(), job.name()).await {
            Ok(row) => row.position,
            Err(e) if e.is_no_rows() => {
                let initial = job.initial_position(&db).await?;
                tracing::info!(job = job.name(), position = %initial, "Initializing checkpoint");
                sync_state::load_or_init(db.as_ref(), job.name(), initial.to_stored())
                    .await?
                    .position
            }
            Err(e) => return Err(e.into()),
        };

        let checkpoint =
            J::Position::from_stored(stored).map_err(|message| SyncError::InvalidPosition {
                job: job.name().to_string(),
                position: stored,
                message,
            })?;

        tracing::info!(job = job.name(), position = %checkpoint, "Sync job ready");

        Ok(Self {
            db,
            job,
            config,
            checkpoint,
            state: EngineState::Idle,
        })
    }

    /// Last committed position.
    pub fn checkpoint(&self) -> J::Position {
        self.checkpoint
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    /// Run one cycle: fetch and apply pages until a short page arrives.
    ///
    /// On error the in-memory checkpoint stays at the last committed batch
    /// and the engine is back to [`EngineState::Idle`].
    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<CycleReport<J::Position>> {
        let result = self.drain(cancel).await;
        self.state = EngineState::Idle;
        result
    }

    async fn drain(&mut self, cancel: &CancellationToken) -> Result<CycleReport<J::Position>> {
        let limit = self.job.page_limit();
        let mut report = CycleReport {
            fetches: 0,
            applied: 0,
            position: self.checkpoint,
        };

        loop {
            self.state = EngineState::Fetching;
            let from = self.job.lower_bound(self.checkpoint);

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                page = self.job.fetch(from) => page?,
            };
            report.fetches += 1;

            let fetched = page.len();
            if fetched == 0 {
                tracing::debug!(job = self.job.name(), from = %from, "No new records");
                break;
            }

            self.state = EngineState::Applying;
            let before = self.checkpoint;
            let position = page
                .iter()
                .map(|record| self.job.position_of(record))
                .fold(before, Ord::max);
            let batch = dedup_last_wins(&self.job, page);

            let applied = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                applied = writer::apply_with_retry(&self.db, &self.job, &batch, position, &self.config) => applied?,
            };

            self.checkpoint = position;
            report.applied += applied;
            report.position = position;

            tracing::info!(
                job = self.job.name(),
                fetched,
                applied,
                position = %position,
                "Applied batch"
            );

            if fetched < limit {
                break;
            }
            if position <= before {
                tracing::warn!(
                    job = self.job.name(),
                    position = %position,
                    "Full page did not move the checkpoint, stopping drain"
                );
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(self.config.drain_delay) => {}
            }
        }

        Ok(report)
    }

    /// Tick on the configured interval until `cancel` fires.
    ///
    /// The first tick runs immediately. Failed cycles are logged and retried
    /// on the next tick.
    ///
    /// # Returns
    /// The checkpoint at shutdown.
    pub async fn run(mut self, cancel: CancellationToken) -> J::Position {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(&cancel).await {
                Ok(report) => tracing::debug!(
                    job = self.job.name(),
                    fetches = report.fetches,
                    applied = report.applied,
                    position = %report.position,
                    "Cycle finished"
                ),
                Err(SyncError::Cancelled) => break,
                Err(e) if e.is_transient() => tracing::warn!(
                    job = self.job.name(),
                    position = %self.checkpoint,
                    error = %e,
                    "Sync cycle failed, retrying next tick"
                ),
                Err(e) => tracing::error!(
                    job = self.job.name(),
                    position = %self.checkpoint,
                    error = %e,
                    "Sync cycle failed"
                ),
            }
        }

        tracing::info!(job = self.job.name(), position = %self.checkpoint, "Sync job stopped");
        self.checkpoint
    }
}
