//! Test utilities for CLI testing
//!
//! Provides a mock unit daemon serving the `/mast/api/v1` endpoints the CLI uses.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use mast_core::api::{
    ApiResponse, InfoResponse, OutletStatus, PowerActivity, PowerSequenceResponse,
    PowerStatusResponse, PresetsResponse, SolverOrigin, SolverStatusResponse, API_BASE,
};
use mast_core::OutletState;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

/// Mock server state
#[derive(Debug, Clone)]
pub struct MockServerState {
    /// Outlet number -> (device name, state)
    pub outlets: Arc<Mutex<BTreeMap<u32, (String, OutletState)>>>,
    /// Stage presets
    pub presets: BTreeMap<String, i64>,
}

impl Default for MockServerState {
    fn default() -> Self {
        let outlets = [(1, "Mount"), (2, "Camera"), (3, "Stage")]
            .into_iter()
            .map(|(n, name)| (n, (name.to_string(), OutletState::Off)))
            .collect();
        let presets = [("Image".to_string(), 52000), ("Spec".to_string(), 1000)]
            .into_iter()
            .collect();

        Self {
            outlets: Arc::new(Mutex::new(outlets)),
            presets,
        }
    }
}

impl MockServerState {
    /// Current state of one outlet
    pub fn outlet(&self, number: u32) -> Option<OutletState> {
        self.outlets.lock().unwrap().get(&number).map(|(_, s)| *s)
    }

    fn statuses(&self) -> Vec<OutletStatus> {
        self.outlets
            .lock()
            .unwrap()
            .iter()
            .map(|(&number, (name, state))| OutletStatus {
                number,
                name: name.clone(),
                state: *state,
            })
            .collect()
    }

    fn set_all(&self, state: OutletState) {
        for (_, s) in self.outlets.lock().unwrap().values_mut() {
            *s = state;
        }
    }

    /// Resolve by number or case-insensitive device name.
    fn set(&self, raw: &str, state: OutletState) -> Option<OutletStatus> {
        let mut outlets = self.outlets.lock().unwrap();
        let number = match raw.parse::<u32>() {
            Ok(n) => n,
            Err(_) => *outlets
                .iter()
                .find(|(_, (name, _))| name.eq_ignore_ascii_case(raw))?
                .0,
        };
        let (name, s) = outlets.get_mut(&number)?;
        *s = state;
        Some(OutletStatus {
            number,
            name: name.clone(),
            state,
        })
    }
}

/// Mock server implementation
#[derive(Debug)]
pub struct MockServer {
    state: MockServerState,
    port: u16,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    /// Create a new mock server
    pub fn new() -> Self {
        Self {
            state: MockServerState::default(),
            port: 0, // Will be assigned when server starts
        }
    }

    /// Start the mock server and return the address
    pub async fn start(mut self) -> Result<(Self, String)> {
        let app = self.create_router();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        self.port = addr.port();

        let server_url = format!("http://127.0.0.1:{}", self.port);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Mock server error: {}", e);
            }
        });

        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                break;
            }
        }

        Ok((self, server_url))
    }

    /// Get the server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the server state
    pub fn state(&self) -> &MockServerState {
        &self.state
    }

    fn create_router(&self) -> Router {
        let api = Router::new()
            .route("/unit/info", get(info_handler))
            .route("/unit/startup", get(startup_handler))
            .route("/unit/shutdown", get(shutdown_handler))
            .route("/unit/power/status", get(power_status_handler))
            .route("/unit/power/outlet/:outlet/on", get(outlet_on_handler))
            .route("/unit/power/outlet/:outlet/off", get(outlet_off_handler))
            .route("/unit/power/outlet/:outlet/cycle", get(outlet_on_handler))
            .route("/unit/solver/status", get(solver_status_handler))
            .route("/stage/presets", get(presets_handler));

        Router::new()
            .nest(API_BASE, api)
            .with_state(self.state.clone())
    }
}

// Handler functions

async fn info_handler() -> Json<ApiResponse<InfoResponse>> {
    Json(ApiResponse::success(InfoResponse {
        version: "0.1.0-test".to_string(),
        unit: "mast01".to_string(),
        uptime: 42,
        mock: true,
        power_switch: Some("mast01-ps".to_string()),
        power_driver: Some("DLI switch at http://mast01-ps:80".to_string()),
        power_activity: PowerActivity::Idle,
        solver_endpoint: "127.0.0.1:9896".to_string(),
        solver_reachable: false,
        site_config: "/etc/mast/mast.toml".to_string(),
        config_sources: vec!["/etc/mast/mast.toml".to_string()],
    }))
}

async fn power_status_handler(
    State(state): State<MockServerState>,
) -> Json<ApiResponse<PowerStatusResponse>> {
    Json(ApiResponse::success(PowerStatusResponse::from_outlets(
        state.statuses(),
    )))
}

/// Switches every outlet at once and reports the sequence as accepted.
async fn startup_handler(
    State(state): State<MockServerState>,
) -> (StatusCode, Json<ApiResponse<PowerSequenceResponse>>) {
    state.set_all(OutletState::On);
    accepted(PowerActivity::StartingUp)
}

async fn shutdown_handler(
    State(state): State<MockServerState>,
) -> (StatusCode, Json<ApiResponse<PowerSequenceResponse>>) {
    state.set_all(OutletState::Off);
    accepted(PowerActivity::ShuttingDown)
}

fn accepted(activity: PowerActivity) -> (StatusCode, Json<ApiResponse<PowerSequenceResponse>>) {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(PowerSequenceResponse {
            accepted: true,
            activity,
        })),
    )
}

fn set_outlet(state: &MockServerState, outlet: &str, to: OutletState) -> ApiResult<OutletStatus> {
    match state.set(outlet, to) {
        Some(status) => Ok(Json(ApiResponse::success(status))),
        None => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Unknown outlet: {}", outlet))),
        )),
    }
}

async fn outlet_on_handler(
    Path(outlet): Path<String>,
    State(state): State<MockServerState>,
) -> ApiResult<OutletStatus> {
    set_outlet(&state, &outlet, OutletState::On)
}

async fn outlet_off_handler(
    Path(outlet): Path<String>,
    State(state): State<MockServerState>,
) -> ApiResult<OutletStatus> {
    set_outlet(&state, &outlet, OutletState::Off)
}

async fn solver_status_handler() -> Json<ApiResponse<SolverStatusResponse>> {
    Json(ApiResponse::success(SolverStatusResponse {
        endpoint: "127.0.0.1:9896".to_string(),
        origin: SolverOrigin::Absent,
        pid: None,
        reachable: false,
        platesolve: None,
        error: Some("Connection refused".to_string()),
    }))
}

async fn presets_handler(
    State(state): State<MockServerState>,
) -> Json<ApiResponse<PresetsResponse>> {
    Json(ApiResponse::success(PresetsResponse {
        presets: state.presets.clone(),
    }))
}
