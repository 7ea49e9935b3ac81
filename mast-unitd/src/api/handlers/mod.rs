//! API request handlers for the MAST unit daemon REST API.
//!
//! # Handler Modules
//!
//! - [`info`] - Root endpoint and unit information
//! - [`unit`] - Effective configuration, unit startup and shutdown
//! - [`power`] - Power switch outlet status and control
//! - [`solver`] - Solver supervisor status and plate solving
//! - [`devices`] - Configured stage presets and focuser position
//!
//! All handlers accept `State<AppState>`, return
//! `Result<Json<ApiResponse<T>>, ApiError>` and log each request at debug level.

pub mod devices;
pub mod info;
pub mod power;
pub mod solver;
pub mod unit;
