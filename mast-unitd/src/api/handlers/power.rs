//! Power switch handlers
//!
//! Outlets are addressed by number (`3`) or by the configured device name
//! (`Stage`, case-insensitive).

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{
    extract::{Path, State},
    Json,
};
use mast_core::api::{ApiResponse, OutletStatus, PowerStatusResponse};
use mast_core::OutletRef;
use tracing::debug;

/// State of every configured outlet.
///
/// Outlets the switch cannot report on read as `unknown`; the request
/// itself does not fail. `activity` tells whether a startup or shutdown is
/// still switching outlets.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/power/status`
pub(crate) async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PowerStatusResponse>>, ApiError> {
    debug!("Request: GET /unit/power/status");

    crate::api_ok!(state.power.power_status().await)
}

fn parse_outlet(raw: &str) -> Result<OutletRef, ApiError> {
    match raw.parse::<OutletRef>() {
        Ok(outlet) => Ok(outlet),
        Err(e) => crate::api_fail!(e.to_string()),
    }
}

/// `GET /mast/api/v1/unit/power/outlet/:outlet/on`
pub(crate) async fn outlet_on(
    State(state): State<AppState>,
    Path(outlet): Path<String>,
) -> Result<Json<ApiResponse<OutletStatus>>, ApiError> {
    debug!("Request: GET /unit/power/outlet/{}/on", outlet);

    let outlet = parse_outlet(&outlet)?;
    crate::api_ok!(state.power.set_outlet(&outlet, true).await?)
}

/// `GET /mast/api/v1/unit/power/outlet/:outlet/off`
pub(crate) async fn outlet_off(
    State(state): State<AppState>,
    Path(outlet): Path<String>,
) -> Result<Json<ApiResponse<OutletStatus>>, ApiError> {
    debug!("Request: GET /unit/power/outlet/{}/off", outlet);

    let outlet = parse_outlet(&outlet)?;
    crate::api_ok!(state.power.set_outlet(&outlet, false).await?)
}

/// Turn the outlet off, wait `power_switch.cycle_time`, turn it back on.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/power/outlet/:outlet/cycle`
pub(crate) async fn outlet_cycle(
    State(state): State<AppState>,
    Path(outlet): Path<String>,
) -> Result<Json<ApiResponse<OutletStatus>>, ApiError> {
    debug!("Request: GET /unit/power/outlet/{}/cycle", outlet);

    let outlet = parse_outlet(&outlet)?;
    crate::api_ok!(state.power.cycle_outlet(&outlet).await?)
}
