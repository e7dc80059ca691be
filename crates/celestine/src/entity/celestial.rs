//! Celestial entity - human-readable identity attached to an address.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Identity record ingested from the celestials change feed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "celestials")]
pub struct Model {
    /// Monotonic internal id.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Identity name as assigned by the feed (natural key).
    #[sea_orm(unique)]
    pub celestial_id: String,
    /// Resolved internal address id.
    pub address_id: i64,
    /// Avatar URL, empty when the feed carries none.
    #[sea_orm(column_type = "Text")]
    pub image_url: String,
    /// Feed change id that produced the current state of this row.
    pub change_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A celestial belongs to an address.
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::AddressId",
        to = "super::address::Column::Id"
    )]
    Address,
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Address.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
