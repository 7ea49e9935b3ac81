//! API models for the MAST unit REST API
//!
//! Request and response bodies shared by the daemon and the CLI client.

use crate::types::OutletState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base path of every unit endpoint
pub const API_BASE: &str = "/mast/api/v1";

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T> {
    #[serde(rename = "success")]
    Success { data: T },
    #[serde(rename = "error")]
    Error { error: String },
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create an error response
    pub fn error(error: String) -> Self {
        Self::Error { error }
    }
}

/// Unit information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Daemon version
    pub version: String,
    /// Unit name the daemon serves
    pub unit: String,
    /// Server uptime in seconds
    pub uptime: u64,
    /// Whether the power switch is simulated
    pub mock: bool,
    /// Power switch host, if one is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_switch: Option<String>,
    /// Driver attached to the switch; absent when outlets cannot be switched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_driver: Option<String>,
    /// Multi-outlet sequence in progress
    #[serde(default)]
    pub power_activity: PowerActivity,
    /// Solver endpoint (`host:port`)
    pub solver_endpoint: String,
    /// Whether the solver port accepts connections
    pub solver_reachable: bool,
    /// Site configuration file the host file is looked up next to
    #[serde(default)]
    pub site_config: String,
    /// Configuration files the daemon loaded
    #[serde(default)]
    pub config_sources: Vec<String>,
}

/// Multi-outlet power sequence currently running on the unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerActivity {
    #[default]
    Idle,
    StartingUp,
    ShuttingDown,
}

impl std::fmt::Display for PowerActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerActivity::Idle => write!(f, "idle"),
            PowerActivity::StartingUp => write!(f, "starting up"),
            PowerActivity::ShuttingDown => write!(f, "shutting down"),
        }
    }
}

/// Answer to a startup or shutdown request.
///
/// The sequence runs in the background; poll `/unit/power/status` until
/// `activity` is back to `idle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSequenceResponse {
    /// False when another sequence was already running and this request was ignored
    pub accepted: bool,
    /// Sequence running after the request was handled
    pub activity: PowerActivity,
}

/// State of one configured outlet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletStatus {
    /// 1-based outlet number
    pub number: u32,
    /// Device plugged into the outlet
    pub name: String,
    pub state: OutletState,
}

/// Status of every configured outlet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerStatusResponse {
    pub outlets: Vec<OutletStatus>,
    /// True when every outlet is on
    pub is_operational: bool,
    /// Why the unit is not operational
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Startup or shutdown in progress
    #[serde(default)]
    pub activity: PowerActivity,
    /// Why the last startup or shutdown failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PowerStatusResponse {
    /// Derive `is_operational` and `reasons` from outlet states.
    pub fn from_outlets(outlets: Vec<OutletStatus>) -> Self {
        let reasons: Vec<String> = outlets
            .iter()
            .filter(|o| o.state != OutletState::On)
            .map(|o| format!("outlet {} ({}) is {}", o.number, o.name, o.state))
            .collect();

        Self {
            is_operational: reasons.is_empty() && !outlets.is_empty(),
            outlets,
            reasons,
            activity: PowerActivity::Idle,
            last_error: None,
        }
    }

    /// Attach the state of the background sequence.
    pub fn with_activity(mut self, activity: PowerActivity, last_error: Option<String>) -> Self {
        self.activity = activity;
        self.last_error = last_error;
        self
    }
}

/// How the daemon got hold of the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverOrigin {
    /// Launched by this daemon
    Spawned,
    /// Already running when the daemon started
    Adopted,
    /// Not running
    Absent,
}

/// Solver supervisor and protocol status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverStatusResponse {
    pub endpoint: String,
    pub origin: SolverOrigin,
    /// Process id when launched by the daemon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub reachable: bool,
    /// Raw `platesolve_status` result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platesolve: Option<serde_json::Value>,
    /// Why `platesolve` is missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Plate-solve request for an image file on the unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub image_file_path: String,
    pub arcsec_per_pixel: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ra_guess_j2000_rads: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec_guess_j2000_rads: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_all_sky_match: Option<bool>,
}

/// Stage position presets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetsResponse {
    pub presets: BTreeMap<String, i64>,
}

/// Focuser known-good position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownGoodResponse {
    pub ascom_driver: String,
    pub known_as_good_position: Option<i64>,
}
