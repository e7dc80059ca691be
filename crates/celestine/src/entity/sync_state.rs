//! SyncState entity - one checkpoint row per named sync job.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Last committed position of a sync job.
///
/// `position` is opaque to storage: change-id feeds store the change id,
/// time-ordered feeds store Unix seconds. It is only ever moved forward, and
/// only inside the transaction that commits the data it covers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_state")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Job name, e.g. `price-feed` or `identity-resolver`.
    #[sea_orm(unique)]
    pub name: String,
    pub position: i64,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
