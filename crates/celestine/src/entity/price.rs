//! Price entity - OHLC candles ingested from the exchange feed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One candle. `(currency, time)` is the natural key.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prices")]
pub struct Model {
    /// Monotonic internal id.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Quote pair the candle belongs to, e.g. `TIAUSDT`.
    pub currency: String,
    /// Candle open time, whole seconds.
    pub time: DateTimeWithTimeZone,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
