//! Celestine - incremental feed indexer for a Celestia-style chain.
//!
//! This library pulls paginated data from rate-limited external sources
//! (price candles, identity change feeds) and persists it with crash-safe,
//! at-least-once semantics. Each batch and its checkpoint are committed in a
//! single transaction, so a restart always resumes from the last fully
//! committed page.
//!
//! # Features
//!
//! - `sqlite` / `postgres` - sea-orm database backends.
//! - `migrate` - Enables [`connect_and_migrate`] and the schema migrations.
//!
//! # Example
//!
//! ```ignore
//! use celestine::sync::{SyncConfig, SyncEngine, jobs::PriceJob};
//! use tokio_util::sync::CancellationToken;
//!
//! let db = Arc::new(celestine::connect_and_migrate("sqlite://celestine.db?mode=rwc").await?);
//! let job = PriceJob::new(binance, PriceJobConfig::default());
//! let engine = SyncEngine::start(db, job, SyncConfig::default()).await?;
//! engine.run(CancellationToken::new()).await;
//! ```

pub mod address;
pub mod db;
pub mod entity;
pub mod http;
pub mod repository;
pub mod retry;
pub mod source;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use repository::{CursorQuery, RepositoryError, SortOrder};
pub use source::{RateLimiter, SourceClient, SourceConfig, SourceError};
pub use sync::{SyncConfig, SyncEngine, SyncError, SyncJob};
