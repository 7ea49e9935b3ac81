//! mast-hardware
//!
//! Device plumbing for a MAST unit: the network power switch that feeds the
//! unit's equipment, and the PlaneWave ps3cli solver server.
//
//! Public API:
//! - `power_switch::PowerSwitch` - outlet control trait, with `MockPowerSwitch`
//! - `dli::DliPowerSwitch` - Digital Loggers REST driver
//! - `solver_process::SolverLaunch` - starts the solver server
//! - `ps3cli::Ps3CliClient` - talks the solver's JSON protocol

pub mod dli;
pub mod power_switch;
pub mod ps3cli;
pub mod solver_process;

pub use dli::DliPowerSwitch;
pub use power_switch::{MockPowerSwitch, PowerSwitch};
pub use ps3cli::{ImageSource, PlatesolveParams, Ps3CliClient};
pub use solver_process::{is_listening, wait_until_listening, SolverLaunch};
