use sea_orm::{ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::entity::address::{ActiveModel, Column, Entity as Address, Model};

use super::cursor::{self, CursorEntity};
use super::errors::{RepositoryError, Result};

impl CursorEntity for Address {
    fn id_column() -> Column {
        Column::Id
    }

    fn id_of(model: &Model) -> i64 {
        model.id
    }
}

/// Ids of every address row stored under `hash`.
///
/// The unique index on `hash` means a healthy store returns zero or one id;
/// callers treat more than one as corruption rather than picking one.
pub async fn id_by_hash<C: ConnectionTrait>(db: &C, hash: &[u8]) -> Result<Vec<i64>> {
    let rows = Address::find()
        .filter(Column::Hash.eq(hash.to_vec()))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

/// Find an address by its raw hash.
///
/// # Errors
/// Returns `RepositoryError::NotFound` if the hash is unknown.
pub async fn find_by_hash<C: ConnectionTrait>(db: &C, hash: &[u8]) -> Result<Model> {
    Address::find()
        .filter(Column::Hash.eq(hash.to_vec()))
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found(format!("addresses.hash={}", hex(hash))))
}

/// Insert a new address row.
pub async fn insert<C: ConnectionTrait>(
    db: &C,
    height: i64,
    hash: Vec<u8>,
    address: impl Into<String>,
) -> Result<Model> {
    cursor::save(
        db,
        ActiveModel {
            id: NotSet,
            height: Set(height),
            hash: Set(hash),
            address: Set(address.into()),
        },
    )
    .await
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
