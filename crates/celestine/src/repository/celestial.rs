use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entity::celestial::{ActiveModel, Column, Entity as Celestial, Model};

use super::cursor::{self, CursorEntity, NaturalKey};
use super::errors::{RepositoryError, Result};

impl CursorEntity for Celestial {
    fn id_column() -> Column {
        Column::Id
    }

    fn id_of(model: &Model) -> i64 {
        model.id
    }
}

impl NaturalKey for Celestial {
    fn natural_key() -> Vec<Column> {
        vec![Column::CelestialId]
    }

    fn update_columns() -> Vec<Column> {
        vec![Column::AddressId, Column::ImageUrl, Column::ChangeId]
    }
}

/// Find a celestial by its feed-assigned name.
///
/// # Errors
/// Returns `RepositoryError::NotFound` if no such celestial exists.
pub async fn find_by_celestial_id<C: ConnectionTrait>(db: &C, celestial_id: &str) -> Result<Model> {
    Celestial::find()
        .filter(Column::CelestialId.eq(celestial_id))
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found(format!("celestials.celestial_id={celestial_id}")))
}

/// All celestials attached to an address, oldest id first.
pub async fn find_by_address_id<C: ConnectionTrait>(db: &C, address_id: i64) -> Result<Vec<Model>> {
    Celestial::find()
        .filter(Column::AddressId.eq(address_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Upsert celestials by `celestial_id`. A later change for the same id
/// overwrites the address, image and change id.
pub async fn upsert_changes<C: ConnectionTrait>(db: &C, models: Vec<ActiveModel>) -> Result<u64> {
    cursor::upsert_many(db, models).await
}
