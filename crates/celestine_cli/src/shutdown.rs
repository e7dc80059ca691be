use tokio_util::sync::CancellationToken;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first Ctrl+C cancels the returned token so running jobs stop after
/// their current cycle; a second one exits immediately with status 130.
pub(crate) fn setup_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        tracing::warn!("Shutdown requested, finishing current operations");
        eprintln!("Press Ctrl+C again to force quit.");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Force quit!");
            std::process::exit(130);
        }
    });

    token
}
