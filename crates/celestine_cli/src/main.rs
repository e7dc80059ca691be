//! Celestine CLI - command-line runner for the feed indexer.

mod commands;
mod config;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::checkpoints::OutputFormat;
use crate::commands::list::{ListOptions, ListTable};
use crate::commands::sync::JobSelection;

#[derive(Parser)]
#[command(name = "celestine")]
#[command(version)]
#[command(about = "Incremental feed indexer for Celestia price and identity data")]
#[command(
    long_about = "Celestine pulls price candles and identity changes from rate-limited \
external APIs and stores them in a local database. Every page and its checkpoint \
are committed together, so a restart resumes from the last committed page."
)]
#[command(after_long_help = r#"EXAMPLES
    Create the schema:
        $ celestine migrate up

    Run every enabled job until Ctrl+C:
        $ celestine sync

    Catch up the price feed once and exit:
        $ celestine sync --only prices --once

    Show stored checkpoints:
        $ celestine checkpoints

    Dump the newest 20 candles:
        $ celestine list prices --desc --limit 20

CONFIGURATION
    Celestine reads configuration from:
      1. ~/.config/celestine/config.toml (or $XDG_CONFIG_HOME/celestine/config.toml)
      2. ./celestine.toml
      3. Environment variables (CELESTINE_* prefix, e.g., CELESTINE_PRICES__SYMBOL)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    CELESTINE_DATABASE__URL       Database connection string (default: ~/.local/state/celestine/celestine.db)
    CELESTINE_PRICES__BASE_URL    Candle API base URL
    CELESTINE_CELESTIALS__BASE_URL Identity API base URL
    RUST_LOG                      Log filter (default: celestine=info,celestine_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Run sync jobs until interrupted
    Sync {
        /// Run only this job, even if disabled in config
        #[arg(long, value_enum)]
        only: Option<JobSelection>,

        /// Run a single cycle per job and exit
        #[arg(long)]
        once: bool,
    },
    /// Show stored sync checkpoints
    Checkpoints {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Print stored rows as JSON lines
    List {
        /// Table to read
        #[arg(value_enum)]
        table: ListTable,

        #[command(flatten)]
        opts: ListOptions,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("celestine=info,celestine_cli=info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load()?;

    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("Failed to determine database URL; set CELESTINE_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Sync { only, once } => {
            let cancel = shutdown::setup_shutdown_handler();
            let db = celestine::connect_and_migrate(&database_url).await?;
            commands::sync::handle_sync(&config, db, only, once, cancel).await?;
        }
        Commands::Checkpoints { output } => {
            let db = celestine::connect(&database_url).await?;
            commands::checkpoints::handle_checkpoints(&db, output).await?;
        }
        Commands::List { table, opts } => {
            let db = celestine::connect(&database_url).await?;
            commands::list::handle_list(&db, table, &opts).await?;
        }
    }

    Ok(())
}
