//! Address entity - chain accounts indexed by the block decoder.
//!
//! Rows are written by the on-chain indexer; the feed jobs only read them to
//! attach external metadata to an internal address id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    /// Monotonic internal id.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Height at which the address was first seen.
    pub height: i64,
    /// Raw account hash (bech32 payload).
    pub hash: Vec<u8>,
    /// Human-readable bech32 form, e.g. `celestia1...`.
    pub address: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::celestial::Entity")]
    Celestial,
}

impl Related<super::celestial::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Celestial.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
