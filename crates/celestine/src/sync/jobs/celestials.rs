//! Identity ingestion from the celestials change feed into `celestials`.

use async_trait::async_trait;
use sea_orm::{ActiveValue::NotSet, DatabaseConnection, DatabaseTransaction, Set};

use crate::address;
use crate::entity::celestial::ActiveModel as CelestialActiveModel;
use crate::repository::{self, celestial};
use crate::source::{Change, ChangeSource, ChangesRequest};
use crate::sync::errors::{Result, SyncError};
use crate::sync::job::SyncJob;
use crate::sync::position::ChangeId;

/// Checkpoint name of the identity job.
pub const IDENTITY_JOB_NAME: &str = "identity-resolver";

/// Changes requested per page.
pub const DEFAULT_CHANGES_LIMIT: u64 = 100;

/// Settings for [`CelestialJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelestialJobConfig {
    pub chain_id: String,
    /// Changes per page.
    pub limit: u64,
    pub only_head: bool,
    pub with_images: bool,
}

impl Default for CelestialJobConfig {
    fn default() -> Self {
        Self {
            chain_id: "celestia".to_string(),
            limit: DEFAULT_CHANGES_LIMIT,
            only_head: true,
            with_images: true,
        }
    }
}

/// Pulls identity changes and attaches them to indexed addresses.
///
/// `from_change_id` is exclusive, so the checkpoint is passed through as-is.
/// Every change must resolve to exactly one stored address; otherwise the
/// whole batch is refused and retried on a later cycle.
///
/// A change naming an address that is not indexed yet blocks the feed: every
/// cycle fails with [`SyncError::UnknownAddress`] and the checkpoint stays put
/// until that address is stored. Changes behind it on the same page wait too.
pub struct CelestialJob<S> {
    source: S,
    config: CelestialJobConfig,
}

impl<S: ChangeSource> CelestialJob<S> {
    pub fn new(source: S, mut config: CelestialJobConfig) -> Self {
        if config.limit == 0 {
            config.limit = DEFAULT_CHANGES_LIMIT;
        }
        Self { source, config }
    }

    pub fn config(&self) -> &CelestialJobConfig {
        &self.config
    }
}

async fn resolve_address(tx: &DatabaseTransaction, bech32: &str) -> Result<i64> {
    let hash = address::decode_account(bech32)?;
    let ids = repository::address::id_by_hash(tx, &hash).await?;
    match ids.as_slice() {
        [id] => Ok(*id),
        [] => {
            tracing::warn!(
                job = IDENTITY_JOB_NAME,
                address = bech32,
                "Change names an unindexed address, holding checkpoint"
            );
            Err(SyncError::UnknownAddress {
                address: bech32.to_string(),
            })
        }
        _ => Err(SyncError::AmbiguousAddress {
            address: bech32.to_string(),
            count: ids.len(),
        }),
    }
}

#[async_trait]
impl<S: ChangeSource> SyncJob for CelestialJob<S> {
    type Position = ChangeId;
    type Key = String;
    type Record = Change;

    fn name(&self) -> &str {
        IDENTITY_JOB_NAME
    }

    fn page_limit(&self) -> usize {
        usize::try_from(self.config.limit).unwrap_or(usize::MAX)
    }

    async fn initial_position(&self, _db: &DatabaseConnection) -> Result<ChangeId> {
        Ok(ChangeId(0))
    }

    fn lower_bound(&self, checkpoint: ChangeId) -> ChangeId {
        checkpoint
    }

    async fn fetch(&self, from: ChangeId) -> Result<Vec<Change>> {
        let request = ChangesRequest {
            chain_id: self.config.chain_id.clone(),
            from_change_id: from.0,
            limit: self.config.limit,
            only_head: self.config.only_head,
            with_images: self.config.with_images,
        };
        let page = self.source.changes(&request).await?;
        tracing::debug!(
            job = IDENTITY_JOB_NAME,
            from = from.0,
            head = page.head,
            fetched = page.changes.len(),
            "Fetched identity changes"
        );
        Ok(page.changes)
    }

    fn key_of(&self, change: &Change) -> String {
        change.celestial_id.clone()
    }

    fn position_of(&self, change: &Change) -> ChangeId {
        ChangeId(change.change_id)
    }

    async fn persist(&self, tx: &DatabaseTransaction, changes: &[Change]) -> Result<u64> {
        let mut models = Vec::with_capacity(changes.len());
        for change in changes {
            let address_id = resolve_address(tx, &change.address).await?;
            models.push(CelestialActiveModel {
                id: NotSet,
                celestial_id: Set(change.celestial_id.clone()),
                address_id: Set(address_id),
                image_url: Set(change.image_url.clone().unwrap_or_default()),
                change_id: Set(change.change_id),
            });
        }

        Ok(celestial::upsert_changes(tx, models).await?)
    }
}
