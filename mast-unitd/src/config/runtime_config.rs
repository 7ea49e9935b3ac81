//! Runtime configuration management
//!
//! Reads the site and host tiers asynchronously and resolves them into the
//! effective [`UnitConfig`] the daemon serves.

use mast_core::config::host_config_path;
use mast_core::{LayeredConfig, MastError, Result, UnitConfig, ValidationWarning};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Effective configuration of the unit this daemon runs on.
///
/// Immutable after load; the daemon must be restarted to pick up edits.
pub(crate) struct RuntimeConfig {
    /// Site file the host file was looked up next to
    site_path: PathBuf,
    layers: LayeredConfig,
    unit: UnitConfig,
}

impl RuntimeConfig {
    /// Load defaults, the site file, and the host file for `unit`.
    ///
    /// Missing files are not an error: the unit then runs on what the
    /// lower tiers provide.
    pub async fn load(site_path: &Path, unit: &str) -> Result<Self> {
        info!("Loading configuration for unit '{}'", unit);

        let mut layers = LayeredConfig::with_defaults();
        Self::read_tier(&mut layers, "site", site_path).await?;
        Self::read_tier(&mut layers, "host", &host_config_path(site_path, unit)).await?;

        Self::from_layers(site_path, layers, unit)
    }

    /// Resolve an already-assembled tier stack.
    pub fn from_layers(site_path: &Path, layers: LayeredConfig, unit: &str) -> Result<Self> {
        let config = layers.resolve(unit)?;
        debug!(
            "Resolved unit '{}': {} outlet(s), solver at {}",
            unit,
            config.power_switch.outlets.len(),
            config.solver.endpoint()
        );

        Ok(Self {
            site_path: site_path.to_path_buf(),
            layers,
            unit: config,
        })
    }

    async fn read_tier(layers: &mut LayeredConfig, name: &str, path: &Path) -> Result<bool> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            info!("No {} config at {}", name, path.display());
            return Ok(false);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| MastError::ConfigRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        layers.push_str(name, Some(path), &content)?;
        info!("  {} config: {}", name, path.display());
        Ok(true)
    }

    /// Validate the effective configuration.
    ///
    /// Returns the warnings when there are no errors.
    pub fn validate(&self) -> Result<Vec<ValidationWarning>> {
        self.unit.validate().into_result().map_err(MastError::Validation)
    }

    pub fn unit_config(&self) -> &UnitConfig {
        &self.unit
    }

    pub fn site_path(&self) -> &Path {
        &self.site_path
    }

    /// Files that contributed, lowest priority first
    pub fn sources(&self) -> Vec<String> {
        self.layers
            .sources()
            .into_iter()
            .map(|p| p.display().to_string())
            .collect()
    }
}
