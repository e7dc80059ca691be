//! Candle ingestion from an OHLC source into `prices`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::NotSet, DatabaseConnection, DatabaseTransaction, Set};

use crate::entity::price::ActiveModel as PriceActiveModel;
use crate::repository::{OptionalExt, price};
use crate::source::{Candle, CandleSource, Interval, OhlcArgs};
use crate::sync::errors::Result;
use crate::sync::job::SyncJob;

/// Checkpoint name of the candle job.
pub const PRICE_JOB_NAME: &str = "price-feed";

/// Candles requested per page.
pub const DEFAULT_PRICE_LIMIT: u32 = 100;

/// Settings for [`PriceJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceJobConfig {
    /// Exchange symbol to request, e.g. `TIAUSDT`.
    pub symbol: String,
    /// Value stored in `prices.currency`.
    pub currency: String,
    pub interval: Interval,
    /// Open time of the first candle wanted on an empty store.
    pub start_time: DateTime<Utc>,
    /// Candles per page.
    pub limit: u32,
}

impl Default for PriceJobConfig {
    fn default() -> Self {
        Self {
            symbol: "TIAUSDT".to_string(),
            currency: "TIAUSDT".to_string(),
            interval: Interval::OneMinute,
            // TIA spot listing
            start_time: DateTime::from_timestamp(1_698_710_400, 0).unwrap_or_default(),
            limit: DEFAULT_PRICE_LIMIT,
        }
    }
}

impl PriceJobConfig {
    /// Fill an empty currency from the symbol and a zero limit with the default.
    #[must_use]
    pub fn validated(mut self) -> Self {
        if self.currency.is_empty() {
            self.currency = self.symbol.clone();
        }
        if self.limit == 0 {
            self.limit = DEFAULT_PRICE_LIMIT;
        }
        self
    }
}

/// Pulls candles for one symbol.
///
/// The checkpoint is the open time of the last stored candle. The exchange
/// treats `startTime` as inclusive, so each fetch starts one interval later.
pub struct PriceJob<S> {
    source: S,
    config: PriceJobConfig,
}

impl<S: CandleSource> PriceJob<S> {
    pub fn new(source: S, config: PriceJobConfig) -> Self {
        Self {
            source,
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &PriceJobConfig {
        &self.config
    }

    fn active_model(&self, candle: &Candle) -> PriceActiveModel {
        PriceActiveModel {
            id: NotSet,
            currency: Set(self.config.currency.clone()),
            time: Set(candle.open_time.fixed_offset()),
            open: Set(candle.open),
            high: Set(candle.high),
            low: Set(candle.low),
            close: Set(candle.close),
        }
    }
}

#[async_trait]
impl<S: CandleSource> SyncJob for PriceJob<S> {
    type Position = DateTime<Utc>;
    type Key = DateTime<Utc>;
    type Record = Candle;

    fn name(&self) -> &str {
        PRICE_JOB_NAME
    }

    fn page_limit(&self) -> usize {
        self.config.limit as usize
    }

    /// Latest stored candle, or one interval before `start_time` so that the
    /// first fetch begins exactly at `start_time`.
    async fn initial_position(&self, db: &DatabaseConnection) -> Result<DateTime<Utc>> {
        let latest = price::last(db, &self.config.currency).await.optional()?;
        Ok(match latest {
            Some(row) => row.time.with_timezone(&Utc),
            None => self.config.start_time - self.config.interval.duration(),
        })
    }

    fn lower_bound(&self, checkpoint: DateTime<Utc>) -> DateTime<Utc> {
        checkpoint + self.config.interval.duration()
    }

    /// Only closed candles are returned. The exchange also serves the
    /// candle that is still open; storing it would move the checkpoint past
    /// a row whose final values were never fetched.
    async fn fetch(&self, from: DateTime<Utc>) -> Result<Vec<Candle>> {
        let interval = self.config.interval.duration();
        let now = Utc::now();
        let args = OhlcArgs {
            start: from,
            end: Some(now - interval),
            limit: Some(self.config.limit),
        };
        let mut candles = self
            .source
            .ohlc(&self.config.symbol, self.config.interval, &args)
            .await?;
        candles.retain(|c| c.open_time + interval <= now);
        Ok(candles)
    }

    fn key_of(&self, candle: &Candle) -> DateTime<Utc> {
        candle.open_time
    }

    fn position_of(&self, candle: &Candle) -> DateTime<Utc> {
        candle.open_time
    }

    async fn persist(&self, tx: &DatabaseTransaction, candles: &[Candle]) -> Result<u64> {
        let models = candles.iter().map(|c| self.active_model(c)).collect();
        Ok(price::upsert_candles(tx, models).await?)
    }
}
