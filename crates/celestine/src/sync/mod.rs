//! Resumable, crash-safe feed synchronization.
//!
//! # Module Structure
//!
//! - [`job`] - `SyncJob`: what a feed needs to provide to be synced
//! - [`engine`] - `SyncEngine`: the checkpointed fetch/apply loop
//! - [`writer`] - batch + checkpoint in a single transaction
//! - [`jobs`] - the candle and identity-change jobs
//!
//! # Example
//!
//! ```ignore
//! use celestine::source::{BinanceApi, SourceConfig, binance};
//! use celestine::sync::{SyncConfig, SyncEngine, jobs::{PriceJob, PriceJobConfig}};
//!
//! let api = BinanceApi::new(SourceConfig::new(binance::DEFAULT_BASE_URL))?;
//! let job = PriceJob::new(api, PriceJobConfig::default());
//! let mut engine = SyncEngine::start(Arc::new(db), job, SyncConfig::default()).await?;
//! let report = engine.tick(&CancellationToken::new()).await?;
//! println!("now at {}", report.position);
//! ```

pub mod engine;
mod errors;
pub mod job;
pub mod jobs;
mod position;
mod types;
pub mod writer;

pub use engine::SyncEngine;
pub use errors::{Result, SyncError};
pub use job::{SyncJob, dedup_last_wins};
pub use position::{ChangeId, SyncPosition};
pub use types::{
    CycleReport, DEFAULT_DB_TIMEOUT, DEFAULT_DRAIN_DELAY, DEFAULT_SYNC_INTERVAL, EngineState,
    SyncConfig,
};
