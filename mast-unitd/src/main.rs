//! MAST Unit Server
//!
//! REST API daemon for one MAST observatory unit: switches the unit's
//! power outlets and keeps the PlaneWave solver server available.
//!
//! # Configuration
//!
//! The unit configuration is assembled from built-in defaults, the site
//! file (`mast.toml`) and the host file (`<unit>.toml`, next to the site
//! file). The unit name comes from `--unit`, `MAST_UNIT` or the host name.

mod api;
mod config;
mod hardware;
mod logging;
mod shutdown;

use anyhow::{anyhow, Context, Result};
use api::AppState;
use clap::Parser;
use config::RuntimeConfig;
use hardware::{connection, PowerManager, SolverSupervisor};
use mast_core::config::{normalize_unit_name, unit_name_from_env};
use mast_core::{default_config_path, MastError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// MAST Unit API Server
#[derive(Parser, Debug)]
#[command(name = "mast-unitd")]
#[command(version, about = "MAST Unit API Server", long_about = None)]
struct Args {
    /// Path to the site configuration file
    #[arg(short, long, env = "MAST_CONFIG")]
    config: Option<PathBuf>,

    /// Unit name (defaults to MAST_UNIT, then the host name)
    #[arg(short, long)]
    unit: Option<String>,

    /// Server bind address (defaults to server.listen_on)
    #[arg(short, long)]
    bind: Option<String>,

    /// Server port (defaults to server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (simulated power switch, solver not launched)
    #[arg(long)]
    mock: bool,

    /// Do not adopt or launch the solver at startup
    #[arg(long)]
    no_solver: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let unit = args
        .unit
        .as_deref()
        .and_then(normalize_unit_name)
        .or_else(unit_name_from_env)
        .ok_or_else(|| anyhow!("Cannot determine the unit name; pass --unit or set MAST_UNIT"))?;

    // Determine config path: CLI flag / env var > default
    let config_path = args.config.clone().unwrap_or_else(default_config_path);

    // Step 1: Load configuration
    let runtime_config = RuntimeConfig::load(&config_path, &unit)
        .await
        .with_context(|| format!("Failed to load configuration for unit '{}'", unit))?;
    let unit_config = runtime_config.unit_config().clone();

    // Step 2: Initialize tracing, now that the log level is known
    let _log_guard = logging::init_tracing(
        args.verbose,
        unit_config.global.log_level,
        &unit_config.global.top_folder,
    );

    info!("MAST Unit Server starting for unit '{}'...", unit);
    info!("Configuration file: {}", config_path.display());
    for source in runtime_config.sources() {
        info!("  loaded: {}", source);
    }

    // Step 3: Validate
    match runtime_config.validate() {
        Ok(warnings) => {
            for warning in warnings {
                warn!("Configuration: {}", warning);
            }
            info!("Configuration validated successfully");
        }
        Err(MastError::Validation(errors)) => {
            for e in &errors {
                error!("Configuration: {}", e);
            }
            error!(
                "Configuration validation failed with {} error(s)",
                errors.len()
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    let port = args.port.unwrap_or(unit_config.server.port);
    let bind = args
        .bind
        .clone()
        .unwrap_or_else(|| unit_config.server.listen_on.clone());
    let bind_addr = format!("{}:{}", bind, port);

    // Step 4: Hardware
    let switch = connection::power_switch(&unit_config.power_switch, args.mock);
    let power = Arc::new(PowerManager::new(&unit_config, switch));

    let solver = Arc::new(SolverSupervisor::new(
        unit_config.solver.clone(),
        unit_config.global.top_folder.clone(),
    ));
    if args.mock || args.no_solver {
        info!("Solver supervision skipped");
    } else {
        match solver.start().await {
            Ok(origin) => info!("Solver at {}: {:?}", solver.endpoint(), origin),
            Err(e) => error!("Solver not available: {}", e),
        }
    }

    // Step 5: Create application state
    let app_state = AppState::new(Arc::new(runtime_config), power, solver, args.mock);
    let state_for_shutdown = app_state.clone();

    // Set up API router
    let app = api::create_router(app_state);

    // Start server
    info!("Starting server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!("MAST Unit API Server listening on {}", bind_addr);
    info!("Server ready!");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::shutdown_signal().await;
            shutdown::release_resources(&state_for_shutdown).await;
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
