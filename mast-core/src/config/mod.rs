//! Configuration model for MAST units
//!
//! This module provides the configuration data structures used by the
//! daemon (`mast-unitd`) and the CLI (`mastctl`).
//!
//! # Architecture
//!
//! - [`LayeredConfig`] - raw TOML tiers (defaults, site file, host file) merged in order
//! - [`UnitConfig`] - the merged document specialized for one unit, loaded once at startup
//! - [`PowerSwitchSection`] - generic power switch plus per-unit overrides
//! - [`ValidationReport`] - cross-field checks run after resolution

mod layers;
mod paths;
mod power_switch;
mod unit_config;
mod validation;

pub use layers::{deep_merge, ConfigTier, LayeredConfig, DEFAULT_CONFIG};
pub use paths::{
    default_config_path, host_config_path, normalize_unit_name, unit_name_from_env, UNIT_ENV,
};
pub use power_switch::{
    parse_outlet_key, PowerSwitchConfig, PowerSwitchOverride, PowerSwitchSection,
};
pub use unit_config::{
    CameraConfig, CoversConfig, FocuserConfig, GlobalConfig, NetworkConfig, ServerConfig,
    SolverConfig, StageConfig, UnitConfig,
};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};
