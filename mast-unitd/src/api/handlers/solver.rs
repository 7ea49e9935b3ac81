//! Solver handlers: supervisor status and plate solving

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use mast_core::api::{ApiResponse, SolveRequest, SolverStatusResponse};
use serde_json::Value;
use tracing::debug;

/// Supervisor state and, when the solver answers, its `platesolve_status`.
///
/// # Endpoint
///
/// `GET /mast/api/v1/unit/solver/status`
pub(crate) async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SolverStatusResponse>>, ApiError> {
    debug!("Request: GET /unit/solver/status");
    crate::api_ok!(state.solver.status().await)
}

/// Start solving an image file that the unit can read.
///
/// # Endpoint
///
/// `POST /mast/api/v1/unit/solver/solve`
///
/// # Errors
///
/// 400 on bad parameters or malformed JSON (415 without a JSON content
/// type, 422 for a well-formed body of the wrong shape), 503 when the solver
/// is unreachable, 502 when it answers with an error.
pub(crate) async fn solve(
    State(state): State<AppState>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
    debug!("Request: POST /unit/solver/solve {:?}", request);
    crate::api_ok!(state.solver.solve(&request).await?)
}

/// `GET /mast/api/v1/unit/solver/cancel`
pub(crate) async fn cancel(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: GET /unit/solver/cancel");
    crate::api_ok!(state.solver.cancel().await?)
}
