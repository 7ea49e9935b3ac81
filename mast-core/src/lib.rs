//! MAST Core Library
//!
//! Shared types, configuration model, and API models for a MAST observatory
//! unit. This crate is used by the daemon, the hardware drivers, and the CLI.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    default_config_path, LayeredConfig, PowerSwitchConfig, SolverConfig, UnitConfig,
    ValidationError, ValidationWarning,
};
pub use error::*;
pub use types::*;
