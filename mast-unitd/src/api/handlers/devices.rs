//! Read-only views of device sections of the configuration

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, Json};
use mast_core::api::{ApiResponse, KnownGoodResponse, PresetsResponse};
use tracing::debug;

/// `GET /mast/api/v1/stage/presets`
pub(crate) async fn stage_presets(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PresetsResponse>>, ApiError> {
    debug!("Request: GET /stage/presets");

    let presets = state.config.unit_config().stage.presets.clone();
    crate::api_ok!(PresetsResponse { presets })
}

/// `GET /mast/api/v1/focuser/known-good`
pub(crate) async fn focuser_known_good(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<KnownGoodResponse>>, ApiError> {
    debug!("Request: GET /focuser/known-good");

    let focuser = &state.config.unit_config().focuser;
    crate::api_ok!(KnownGoodResponse {
        ascom_driver: focuser.ascom_driver.clone(),
        known_as_good_position: focuser.known_as_good_position,
    })
}
