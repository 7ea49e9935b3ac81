//! Info handlers for unit information and root endpoint

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, Json};
use mast_core::api::{ApiResponse, InfoResponse};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Handle the root endpoint.
///
/// Basic service identification, useful as a health check.
///
/// # Endpoint
///
/// `GET /`
pub(crate) async fn root() -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: GET /");

    let data = json!({
        "service": "MAST Unit API Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    });

    crate::api_ok!(data)
}

/// Retrieve unit information.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/info`
///
/// # Returns
///
/// - `version` - Daemon version
/// - `unit` - Unit name the configuration was resolved for
/// - `uptime` - Server uptime in seconds
/// - `mock` - Whether the power switch is simulated
/// - `power_switch` - Switch host, when configured
/// - `power_driver` - Driver attached to the switch, absent when outlets cannot be switched
/// - `power_activity` - Startup or shutdown in progress
/// - `solver_endpoint` / `solver_reachable` - Where the solver should listen and whether it does
/// - `site_config` - Site file the host file is looked up next to
/// - `config_sources` - Configuration files that were loaded
pub(crate) async fn get_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InfoResponse>>, ApiError> {
    debug!("Request: GET /unit/info");

    let unit = state.config.unit_config();
    let solver_endpoint = state.solver.endpoint();
    let solver_reachable =
        mast_hardware::is_listening(&solver_endpoint, Duration::from_millis(500)).await;

    let info = InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        unit: unit.unit.clone(),
        uptime: state.start_time.elapsed().as_secs(),
        mock: state.mock,
        power_switch: unit.power_switch.host.clone(),
        power_driver: state.power.describe(),
        power_activity: state.power.activity(),
        solver_endpoint,
        solver_reachable,
        site_config: state.config.site_path().display().to_string(),
        config_sources: state.config.sources(),
    };

    crate::api_ok!(info)
}
