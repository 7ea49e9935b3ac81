//! API module for the MAST unit daemon
//!
//! Contains the REST API implementation with Axum router and handlers.

pub(crate) mod handlers;

use crate::config::RuntimeConfig;
use crate::hardware::{PowerManager, SolverSupervisor};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use mast_core::api::API_BASE;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Application state shared across all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    /// Effective unit configuration
    pub config: Arc<RuntimeConfig>,
    /// Power switch sequencing
    pub power: Arc<PowerManager>,
    /// Solver process and protocol access
    pub solver: Arc<SolverSupervisor>,
    /// Whether the power switch is simulated
    pub mock: bool,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Arc<RuntimeConfig>,
        power: Arc<PowerManager>,
        solver: Arc<SolverSupervisor>,
        mock: bool,
    ) -> Self {
        Self {
            config,
            power,
            solver,
            mock,
            start_time: Instant::now(),
        }
    }
}

/// Create the main API router with all endpoints
pub(crate) fn create_router(state: AppState) -> Router {
    info!("Setting up API router...");

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024));

    let api = Router::new()
        // Unit endpoints
        .route("/unit/info", get(handlers::info::get_info))
        .route("/unit/config", get(handlers::unit::get_config))
        .route("/unit/startup", get(handlers::unit::startup))
        .route("/unit/shutdown", get(handlers::unit::shutdown))
        // Power switch endpoints
        .route("/unit/power/status", get(handlers::power::get_status))
        .route(
            "/unit/power/outlet/:outlet/on",
            get(handlers::power::outlet_on),
        )
        .route(
            "/unit/power/outlet/:outlet/off",
            get(handlers::power::outlet_off),
        )
        .route(
            "/unit/power/outlet/:outlet/cycle",
            get(handlers::power::outlet_cycle),
        )
        // Solver endpoints
        .route("/unit/solver/status", get(handlers::solver::get_status))
        .route("/unit/solver/solve", post(handlers::solver::solve))
        .route("/unit/solver/cancel", get(handlers::solver::cancel))
        // Device configuration endpoints
        .route("/stage/presets", get(handlers::devices::stage_presets))
        .route("/focuser/known-good", get(handlers::devices::focuser_known_good));

    Router::new()
        .nest(API_BASE, api)
        // Root endpoint
        .route("/", get(handlers::info::root))
        .layer(middleware_stack)
        .with_state(state)
}

/// Error handling utilities
pub(crate) mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use mast_core::api::ApiResponse;
    use mast_core::MastError;

    use tracing::error;

    /// Custom error type for API responses
    #[derive(Debug)]
    pub struct ApiError {
        pub status_code: StatusCode,
        pub message: String,
    }

    impl ApiError {
        /// Create a new API error
        pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
            Self {
                status_code,
                message: message.into(),
            }
        }

        /// Create a bad request error
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::new(StatusCode::BAD_REQUEST, message)
        }

        /// Create an internal server error
        pub fn internal_error(message: impl Into<String>) -> Self {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }

        /// Create a service unavailable error (switch or solver unreachable)
        pub fn service_unavailable(message: impl Into<String>) -> Self {
            Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            error!("API Error {}: {}", self.status_code, self.message);

            let response: ApiResponse<()> = ApiResponse::error(self.message);

            (self.status_code, Json(response)).into_response()
        }
    }

    /// Convert MastError to ApiError
    impl From<MastError> for ApiError {
        fn from(err: MastError) -> Self {
            match err {
                MastError::InvalidInput(msg) => Self::bad_request(msg),
                MastError::OutletNotFound(outlet) => {
                    Self::bad_request(format!("Unknown outlet: {}", outlet))
                }
                MastError::PowerSwitch(msg) => Self::service_unavailable(msg),
                MastError::Solver(msg) => Self::service_unavailable(msg),
                MastError::Timeout(msg) => Self::service_unavailable(msg),
                MastError::SolverResponse(msg) => Self::new(StatusCode::BAD_GATEWAY, msg),
                _ => Self::internal_error(err.to_string()),
            }
        }
    }

}

/// Helper macros for common responses
#[macro_export]
macro_rules! api_ok {
    ($data:expr) => {
        Ok(axum::Json(mast_core::api::ApiResponse::success($data)))
    };
}

#[macro_export]
macro_rules! api_fail {
    ($message:expr) => {
        Err($crate::api::error::ApiError::bad_request($message))
    };
}
