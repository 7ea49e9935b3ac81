//! Shutdown handling for graceful daemon termination
//!
//! Outlets are left as they are: stopping the daemon must not power off
//! the unit. A solver this daemon launched is stopped; an adopted one keeps
//! running.

use crate::api::AppState;
use tokio::signal;
use tracing::info;

/// Wait for Ctrl+C or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Release what the daemon owns before exiting.
pub(crate) async fn release_resources(state: &AppState) {
    state.solver.shutdown().await;
    info!(
        "Unit '{}' daemon stopped after {}s",
        state.config.unit_config().unit,
        state.start_time.elapsed().as_secs()
    );
}
