//! Unit-wide handlers: effective configuration, startup and shutdown

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, http::StatusCode, Json};
use mast_core::api::{ApiResponse, PowerSequenceResponse};
use mast_core::UnitConfig;
use tracing::{debug, info};

/// Effective configuration of this unit, password masked.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/config`
pub(crate) async fn get_config(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UnitConfig>>, ApiError> {
    debug!("Request: GET /unit/config");
    crate::api_ok!(state.config.unit_config().redacted())
}

/// Start powering every outlet on, in outlet order, honoring each device's
/// `delay_after_on`.
///
/// The sequence runs in the background; the request returns at once.
/// Progress is reported by `/unit/power/status`.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/startup`
///
/// # Returns
///
/// 202 with `accepted: true` when the sequence was started, 200 with
/// `accepted: false` when a startup or shutdown was already running.
///
/// # Errors
///
/// 503 when the unit has no power switch.
pub(crate) async fn startup(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<PowerSequenceResponse>>), ApiError> {
    debug!("Request: GET /unit/startup");
    sequence_reply(state.power.begin_startup()?)
}

/// Start powering every outlet off, highest outlet first.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/shutdown`
pub(crate) async fn shutdown(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<PowerSequenceResponse>>), ApiError> {
    debug!("Request: GET /unit/shutdown");
    sequence_reply(state.power.begin_shutdown()?)
}

fn sequence_reply(
    response: PowerSequenceResponse,
) -> Result<(StatusCode, Json<ApiResponse<PowerSequenceResponse>>), ApiError> {
    let status = if response.accepted {
        info!("Unit is {}", response.activity);
        StatusCode::ACCEPTED
    } else {
        info!("Request ignored, unit is already {}", response.activity);
        StatusCode::OK
    };
    Ok((status, Json(ApiResponse::success(response))))
}
