//! Error types for the MAST unit system

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ValidationError;

/// Core error type for MAST unit operations
#[derive(Error, Debug)]
pub enum MastError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML or does not match the model
    #[error("Invalid configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The resolved configuration failed validation
    #[error("Configuration validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// Power switch communication errors
    #[error("Power switch error: {0}")]
    PowerSwitch(String),

    /// Outlet not present in the effective power-switch configuration
    #[error("Outlet not found: {0}")]
    OutletNotFound(String),

    /// Solver server errors (process or protocol)
    #[error("Solver error: {0}")]
    Solver(String),

    /// The solver answered with an error member
    #[error("Solver returned an error: {0}")]
    SolverResponse(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for MAST operations
pub type Result<T> = std::result::Result<T, MastError>;

impl From<serde_json::Error> for MastError {
    fn from(err: serde_json::Error) -> Self {
        MastError::Serialization(err.to_string())
    }
}
