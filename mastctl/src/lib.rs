//! MAST CLI Library
//!
//! Core functionality of the `mastctl` tool.
//!
//! # Public API
//!
//! The primary public API is [`client::MastClient`], which gives
//! programmatic access to a unit daemon. CLI settings are available via
//! [`config::CliConfig`] and [`config::ConfigBuilder`].
//!
//! ```no_run
//! use mastctl::client::MastClient;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = MastClient::with_config(
//!     "http://mast01:8000".to_string(),
//!     10,  // timeout in seconds
//!     3,   // max retries
//!     Duration::from_millis(500),  // initial retry delay
//! )?;
//!
//! let status = client.power_status().await?;
//! println!("operational: {}", status.is_operational);
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// HTTP client for communicating with a unit daemon.
pub mod client;

/// Configuration types for the CLI tool.
pub mod config;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;

#[cfg(test)]
pub mod test_utils;
