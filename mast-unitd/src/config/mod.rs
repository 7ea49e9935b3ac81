//! Configuration management module
//!
//! Loads the tiered unit configuration from disk at startup.

mod runtime_config;

pub(crate) use runtime_config::RuntimeConfig;
