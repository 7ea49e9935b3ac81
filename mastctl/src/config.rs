//! CLI configuration management
//!
//! Handles loading and saving CLI-specific settings (`mast/cli.toml` in the
//! user's config directory). This is unrelated to the unit configuration
//! the daemon reads.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables read by [`ConfigBuilder::with_env_overrides`]
pub const ENV_SERVER: &str = "MAST_SERVER";
pub const ENV_FORMAT: &str = "MAST_FORMAT";
pub const ENV_VERBOSE: &str = "MAST_VERBOSE";
pub const ENV_TIMEOUT: &str = "MAST_TIMEOUT";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliConfig {
    /// Unit daemon URL
    pub server_url: String,

    /// Default output format
    pub output_format: String,

    /// Enable verbose logging by default
    pub verbose: bool,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            output_format: "table".to_string(),
            verbose: false,
            timeout: 10,
        }
    }
}

/// Settings file contents; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct CliConfigFile {
    server_url: Option<String>,
    output_format: Option<String>,
    verbose: Option<bool>,
    timeout: Option<u64>,
}

impl CliConfig {
    /// Default settings file path: `<config dir>/mast/cli.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("mast").join("cli.toml"))
            .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))
    }

    /// Save configuration to `path`, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize CLI config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write CLI config file {}", path.display()))?;

        Ok(())
    }

    /// Create a new builder for constructing configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Builder for CLI configuration with validation and priority chain support
///
/// Each step overrides what the previous ones set. Call them in priority
/// order (lowest to highest):
/// 1. Defaults
/// 2. Config file
/// 3. Environment variables
/// 4. CLI arguments
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server_url: Option<String>,
    output_format: Option<String>,
    verbose: Option<bool>,
    timeout: Option<u64>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server URL (with validation)
    pub fn with_server_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        Self::validate_url(&url)?;
        self.server_url = Some(url);
        Ok(self)
    }

    /// Set output format (with validation)
    pub fn with_output_format(mut self, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        Self::validate_output_format(&format)?;
        self.output_format = Some(format);
        Ok(self)
    }

    /// Set verbose flag
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Set timeout (with validation)
    pub fn with_timeout(mut self, timeout: u64) -> Result<Self> {
        Self::validate_timeout(timeout)?;
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Apply the settings file at `path` (or the default path).
    ///
    /// A missing file is not an error; an unreadable or invalid one is.
    pub fn with_config_file(self, path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match CliConfig::default_path() {
                Ok(path) => path,
                Err(_) => return Ok(self),
            },
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read CLI config file {}", path.display()))
            }
        };
        let file: CliConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse CLI config file {}", path.display()))?;

        let mut builder = self;
        if let Some(url) = file.server_url {
            builder = builder.with_server_url(url)?;
        }
        if let Some(format) = file.output_format {
            builder = builder.with_output_format(format)?;
        }
        if let Some(verbose) = file.verbose {
            builder = builder.with_verbose(verbose);
        }
        if let Some(timeout) = file.timeout {
            builder = builder.with_timeout(timeout)?;
        }
        Ok(builder)
    }

    /// Apply `MAST_*` environment variables. Invalid values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(server_url) = std::env::var(ENV_SERVER) {
            if Self::validate_url(&server_url).is_ok() {
                self.server_url = Some(server_url);
            }
        }

        if let Ok(format) = std::env::var(ENV_FORMAT) {
            if Self::validate_output_format(&format).is_ok() {
                self.output_format = Some(format);
            }
        }

        if let Ok(verbose) = std::env::var(ENV_VERBOSE) {
            self.verbose = Some(parse_bool(&verbose));
        }

        if let Ok(timeout) = std::env::var(ENV_TIMEOUT) {
            if let Ok(timeout) = timeout.parse() {
                if Self::validate_timeout(timeout).is_ok() {
                    self.timeout = Some(timeout);
                }
            }
        }

        self
    }

    /// Build the final configuration with validation
    pub fn build(self) -> Result<CliConfig> {
        let defaults = CliConfig::default();

        let server_url = self.server_url.unwrap_or(defaults.server_url);
        let output_format = self.output_format.unwrap_or(defaults.output_format);
        let timeout = self.timeout.unwrap_or(defaults.timeout);

        Self::validate_url(&server_url)?;
        Self::validate_output_format(&output_format)?;
        Self::validate_timeout(timeout)?;

        Ok(CliConfig {
            server_url,
            output_format,
            verbose: self.verbose.unwrap_or(defaults.verbose),
            timeout,
        })
    }

    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(anyhow::anyhow!("Server URL cannot be empty"));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "Server URL must start with http:// or https://"
            ));
        }

        Ok(())
    }

    fn validate_output_format(format: &str) -> Result<()> {
        match format {
            "table" | "json" => Ok(()),
            _ => Err(anyhow::anyhow!(
                "Invalid output format '{}'. Must be 'table' or 'json'",
                format
            )),
        }
    }

    fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(anyhow::anyhow!("Timeout must be greater than 0"));
        }

        if timeout > 300 {
            return Err(anyhow::anyhow!(
                "Timeout must be less than or equal to 300 seconds"
            ));
        }

        Ok(())
    }
}
