use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use celestine::source::{BinanceApi, CelestialsApi};
use celestine::sync::jobs::{CelestialJob, PriceJob};
use celestine::{SyncEngine, SyncError, SyncJob};

use crate::config::Config;

/// Which jobs `celestine sync` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum JobSelection {
    /// Price candles only
    Prices,
    /// Identity changes only
    Celestials,
}

pub(crate) async fn handle_sync(
    config: &Config,
    db: DatabaseConnection,
    only: Option<JobSelection>,
    once: bool,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let wants = |job: JobSelection, enabled: bool| match only {
        Some(selected) => selected == job,
        None => enabled,
    };
    let db = Arc::new(db);
    let sync_config = config.sync_config();
    let mut tasks = JoinSet::new();

    if wants(JobSelection::Prices, config.prices.enabled) {
        let api = BinanceApi::new(config.prices.source_config())?;
        let job = PriceJob::new(api, config.prices.job_config());
        let engine = SyncEngine::start(Arc::clone(&db), job, sync_config.clone()).await?;
        tasks.spawn(drive(engine, once, cancel.clone()));
    }

    if wants(JobSelection::Celestials, config.celestials.enabled) {
        let api = CelestialsApi::new(config.celestials.source_config())?;
        let job = CelestialJob::new(api, config.celestials.job_config());
        let engine = SyncEngine::start(Arc::clone(&db), job, sync_config.clone()).await?;
        tasks.spawn(drive(engine, once, cancel.clone()));
    }

    if tasks.is_empty() {
        println!("No sync jobs enabled.");
        return Ok(());
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Sync job failed");
                failed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync task panicked");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} sync job(s) failed").into());
    }
    Ok(())
}

/// Run one engine until cancelled, or for a single cycle with `once`.
async fn drive<J: SyncJob + 'static>(
    mut engine: SyncEngine<J>,
    once: bool,
    cancel: CancellationToken,
) -> Result<(), SyncError> {
    let name = engine.job().name().to_string();
    tracing::info!(job = %name, position = %engine.checkpoint(), "Sync job started");

    if !once {
        engine.run(cancel).await;
        return Ok(());
    }

    match engine.tick(&cancel).await {
        Ok(report) => {
            println!(
                "{name}: {} fetch(es), {} row(s) applied, checkpoint {}",
                report.fetches, report.applied, report.position
            );
            Ok(())
        }
        Err(SyncError::Cancelled) => Ok(()),
        Err(e) => Err(e),
    }
}
