//! Typed configuration of one MAST unit
//!
//! Produced by merging the configuration tiers and specializing the
//! `[power_switch]` section for a single unit. Read-only after startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use toml::{Table, Value};

use super::power_switch::{PowerSwitchConfig, PowerSwitchSection};
use crate::error::{MastError, Result};
use crate::types::LogLevel;

/// `[global]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Root of the unit's data tree (daily folders, logs)
    pub top_folder: PathBuf,
    /// Log verbosity
    pub log_level: LogLevel,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            top_folder: PathBuf::from("C:/MAST"),
            log_level: LogLevel::Debug,
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub listen_on: String,
    /// Listening port of the unit daemon
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_on: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// `[solver]`: the PlaneWave ps3cli plate-solving server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Vendor installation directory, used as the working directory
    pub install_dir: PathBuf,
    /// Executable file name inside `install_dir`
    pub executable: String,
    /// Host the solver listens on
    pub host: String,
    /// Solver TCP port
    pub port: u16,
    /// Seconds to wait for a freshly launched solver to accept connections
    pub startup_timeout: u64,
    /// Whether the daemon launches the solver when none is running
    pub autostart: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from(r"C:\Program Files (x86)\PlaneWave Instruments\ps3cli"),
            executable: "ps3cli-20240829.exe".to_string(),
            host: "127.0.0.1".to_string(),
            port: 9896,
            startup_timeout: 30,
            autostart: true,
        }
    }
}

impl SolverConfig {
    /// `host:port` of the solver
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `[stage]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Named stage positions (encoder steps)
    pub presets: BTreeMap<String, i64>,
    /// Seconds to wait after powering the stage on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_after_on: Option<u64>,
}

/// `[camera]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// ASCOM driver ProgID
    pub ascom_driver: String,
    /// Seconds to wait after powering the camera on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_after_on: Option<u64>,
    /// Seconds between sensor temperature checks
    pub temp_check_interval: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ascom_driver: String::new(),
            delay_after_on: None,
            temp_check_interval: 15,
        }
    }
}

/// `[focuser]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocuserConfig {
    pub ascom_driver: String,
    /// Last position known to give a good focus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_as_good_position: Option<i64>,
}

/// `[covers]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoversConfig {
    pub ascom_driver: String,
}

/// `[network]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interface name, e.g. "Ethernet"
    pub interface: String,
    /// IPv4 address
    pub address: String,
    /// Dotted subnet mask
    pub mask: String,
    /// CIDR prefix length
    pub prefix: u8,
}

/// Every section except `[power_switch]`, as found in the merged document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct UnitDocument {
    global: GlobalConfig,
    server: ServerConfig,
    solver: SolverConfig,
    stage: StageConfig,
    camera: CameraConfig,
    focuser: FocuserConfig,
    covers: CoversConfig,
    network: Option<NetworkConfig>,
}

/// Effective configuration of one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitConfig {
    /// Unit name the configuration was resolved for
    pub unit: String,
    pub global: GlobalConfig,
    pub server: ServerConfig,
    pub solver: SolverConfig,
    pub stage: StageConfig,
    pub camera: CameraConfig,
    pub focuser: FocuserConfig,
    pub covers: CoversConfig,
    /// The generic power switch merged with this unit's override
    pub power_switch: PowerSwitchConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
}

impl UnitConfig {
    /// Specialize a merged configuration document for `unit`.
    pub fn from_table(mut table: Table, unit: &str) -> Result<Self> {
        let parse_err = |source: toml::de::Error| MastError::ConfigParse {
            path: PathBuf::from("<merged>"),
            source,
        };

        let power_switch = match table.remove("power_switch") {
            Some(Value::Table(section)) => PowerSwitchSection::from_table(&section)
                .map_err(parse_err)?
                .for_unit(unit),
            Some(_) => {
                return Err(MastError::Config(
                    "'power_switch' must be a table".to_string(),
                ))
            }
            None => PowerSwitchConfig::default(),
        };

        let doc: UnitDocument = Value::Table(table).try_into().map_err(parse_err)?;

        Ok(Self {
            unit: unit.to_string(),
            global: doc.global,
            server: doc.server,
            solver: doc.solver,
            stage: doc.stage,
            camera: doc.camera,
            focuser: doc.focuser,
            covers: doc.covers,
            power_switch,
            network: doc.network,
        })
    }

    /// Parse a single TOML document and specialize it for `unit`.
    pub fn from_toml(content: &str, unit: &str) -> Result<Self> {
        let table: Table = toml::from_str(content).map_err(|source| MastError::ConfigParse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_table(table, unit)
    }

    /// Copy safe to show to API clients.
    pub fn redacted(&self) -> UnitConfig {
        UnitConfig {
            power_switch: self.power_switch.redacted(),
            ..self.clone()
        }
    }

    /// Seconds to wait after powering on the device named `device`.
    ///
    /// Devices with their own `delay_after_on` use it; the others use the switch's.
    pub fn delay_after_on(&self, device: &str) -> u64 {
        let own = if device.eq_ignore_ascii_case("stage") {
            self.stage.delay_after_on
        } else if device.eq_ignore_ascii_case("camera") {
            self.camera.delay_after_on
        } else {
            None
        };
        own.unwrap_or(self.power_switch.delay_after_on)
    }
}
