//! Configuration file support for celestine.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `CELESTINE_`, sections separated by `__`,
//!    e.g., `CELESTINE_DATABASE__URL`)
//! 3. Config file (~/.config/celestine/config.toml or ./celestine.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/celestine/celestine.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "postgres://indexer@localhost/celestine"
//!
//! [sync]
//! interval_secs = 60
//! drain_delay_ms = 200
//! db_timeout_secs = 30
//!
//! [prices]
//! enabled = true
//! base_url = "https://api.binance.com"
//! symbol = "TIAUSDT"
//! interval = "1m"
//! start_time = 1698710400
//! limit = 100
//! requests_per_second = 10
//!
//! [celestials]
//! enabled = true
//! base_url = "https://api.celestials.id"
//! chain_id = "celestia"
//! limit = 100
//! ```

use std::path::PathBuf;
use std::time::Duration;

use celestine::source::{Interval, SourceConfig, binance, celestials};
use celestine::sync::jobs::{CelestialJobConfig, PriceJobConfig};
use celestine::sync::{DEFAULT_DB_TIMEOUT, DEFAULT_DRAIN_DELAY, DEFAULT_SYNC_INTERVAL};
use celestine::SyncConfig;
use chrono::DateTime;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config as Settings, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Engine timing shared by every job.
    pub sync: SyncSection,
    /// Candle feed.
    pub prices: PricesConfig,
    /// Identity change feed.
    pub celestials: CelestialsConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/celestine/celestine.db` if not specified.
    pub url: Option<String>,
}

/// Engine timing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Seconds between cycle starts.
    pub interval_secs: u64,
    /// Pause between full pages while draining a backlog.
    pub drain_delay_ms: u64,
    /// Deadline for one batch transaction.
    pub db_timeout_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL.as_secs(),
            drain_delay_ms: DEFAULT_DRAIN_DELAY.as_millis() as u64,
            db_timeout_secs: DEFAULT_DB_TIMEOUT.as_secs(),
        }
    }
}

/// Candle feed configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PricesConfig {
    /// Run the candle job under `celestine sync`.
    pub enabled: bool,
    pub base_url: String,
    /// Exchange symbol, e.g. "TIAUSDT".
    pub symbol: String,
    /// Stored currency name; empty means the symbol.
    pub currency: String,
    /// Kline interval, e.g. "1m".
    pub interval: Interval,
    /// Unix seconds of the first candle wanted on an empty store.
    pub start_time: i64,
    /// Candles per request.
    pub limit: u32,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        let job = PriceJobConfig::default();
        Self {
            enabled: true,
            base_url: binance::DEFAULT_BASE_URL.to_string(),
            symbol: job.symbol,
            currency: job.currency,
            interval: job.interval,
            start_time: job.start_time.timestamp(),
            limit: job.limit,
            requests_per_second: celestine::source::DEFAULT_RPS,
            timeout_secs: celestine::source::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Identity change feed configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CelestialsConfig {
    /// Run the identity job under `celestine sync`.
    pub enabled: bool,
    pub base_url: String,
    pub chain_id: String,
    /// Changes per request.
    pub limit: u64,
    /// Ask for the current head of each identity only.
    pub only_head: bool,
    pub with_images: bool,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for CelestialsConfig {
    fn default() -> Self {
        let job = CelestialJobConfig::default();
        Self {
            enabled: true,
            base_url: celestials::DEFAULT_BASE_URL.to_string(),
            chain_id: job.chain_id,
            limit: job.limit,
            only_head: job.only_head,
            with_images: job.with_images,
            requests_per_second: celestine::source::DEFAULT_RPS,
            timeout_secs: celestine::source::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/celestine/config.toml)
    /// 3. Local config file (./celestine.toml)
    /// 4. Environment variables with CELESTINE_ prefix
    ///
    /// # Errors
    /// Returns `ConfigError` if a source cannot be read or a value does not
    /// fit its field. Nothing falls back to defaults in that case.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Settings::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "celestine") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("celestine.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./celestine.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // CELESTINE_PRICES__BASE_URL -> prices.base_url
        builder = builder.add_source(
            Environment::with_prefix("CELESTINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::resolve(builder)
    }

    /// Build and deserialize the layered sources.
    fn resolve(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("celestine.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/celestine` or `~/.local/state/celestine`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "celestine").map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }

    /// Engine settings for every job.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: Duration::from_secs(self.sync.interval_secs),
            drain_delay: Duration::from_millis(self.sync.drain_delay_ms),
            db_timeout: Duration::from_secs(self.sync.db_timeout_secs),
            ..SyncConfig::default()
        }
        .validated()
    }
}

impl PricesConfig {
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            base_url: self.base_url.clone(),
            requests_per_second: self.requests_per_second,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Job settings; an out-of-range `start_time` falls back to the default.
    pub fn job_config(&self) -> PriceJobConfig {
        let defaults = PriceJobConfig::default();
        PriceJobConfig {
            symbol: self.symbol.clone(),
            currency: self.currency.clone(),
            interval: self.interval,
            start_time: DateTime::from_timestamp(self.start_time, 0)
                .unwrap_or(defaults.start_time),
            limit: self.limit,
        }
        .validated()
    }
}

impl CelestialsConfig {
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            base_url: self.base_url.clone(),
            requests_per_second: self.requests_per_second,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn job_config(&self) -> CelestialJobConfig {
        CelestialJobConfig {
            chain_id: self.chain_id.clone(),
            limit: self.limit,
            only_head: self.only_head,
            with_images: self.with_images,
        }
    }
}
