use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entity::price::{ActiveModel, Column, Entity as Price, Model};

use super::cursor::{self, CursorEntity, NaturalKey};
use super::errors::{RepositoryError, Result};

impl CursorEntity for Price {
    fn id_column() -> Column {
        Column::Id
    }

    fn id_of(model: &Model) -> i64 {
        model.id
    }
}

impl NaturalKey for Price {
    fn natural_key() -> Vec<Column> {
        vec![Column::Currency, Column::Time]
    }

    fn update_columns() -> Vec<Column> {
        vec![Column::Open, Column::High, Column::Low, Column::Close]
    }
}

/// Most recent candle stored for `currency`.
///
/// # Errors
/// Returns `RepositoryError::NotFound` if no candle exists yet.
pub async fn last<C: ConnectionTrait>(db: &C, currency: &str) -> Result<Model> {
    Price::find()
        .filter(Column::Currency.eq(currency))
        .order_by_desc(Column::Time)
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found(format!("prices.currency={currency}")))
}

/// Candles for `currency` with `from <= time <= to`, oldest first.
pub async fn range<C: ConnectionTrait>(
    db: &C,
    currency: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Model>> {
    if from > to {
        return Err(RepositoryError::InvalidInput {
            message: format!("price range starts after it ends: {from} > {to}"),
        });
    }

    Price::find()
        .filter(Column::Currency.eq(currency))
        .filter(Column::Time.gte(from.fixed_offset()))
        .filter(Column::Time.lte(to.fixed_offset()))
        .order_by_asc(Column::Time)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Upsert candles by `(currency, time)`.
pub async fn upsert_candles<C: ConnectionTrait>(db: &C, models: Vec<ActiveModel>) -> Result<u64> {
    cursor::upsert_many(db, models).await
}
