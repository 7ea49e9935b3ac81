//! Tiered configuration documents
//!
//! A unit's configuration is assembled from several TOML documents merged in
//! priority order:
//!
//! 1. built-in defaults ([`DEFAULT_CONFIG`])
//! 2. the site file shared by every unit (`mast.toml`)
//! 3. the host file for one unit (`<unit>.toml`, next to the site file)
//!
//! Tables are merged recursively; any non-table value in a higher tier
//! replaces the lower one.

use std::path::{Path, PathBuf};

use toml::{Table, Value};

use super::unit_config::UnitConfig;
use crate::error::{MastError, Result};

/// Built-in defaults, the lowest configuration tier.
pub const DEFAULT_CONFIG: &str = r#"
[global]
top_folder = "C:/MAST"
log_level = "debug"

[server]
listen_on = "0.0.0.0"
port = 8000

[solver]
install_dir = 'C:\Program Files (x86)\PlaneWave Instruments\ps3cli'
executable = "ps3cli-20240829.exe"
host = "127.0.0.1"
port = 9896
startup_timeout = 30
autostart = true

[camera]
temp_check_interval = 15

[power_switch]
port = 80
userid = "admin"
password = "1234"
timeout = 2
cycle_time = 3
delay_after_on = 3
"#;

/// One layer of configuration
#[derive(Debug, Clone)]
pub struct ConfigTier {
    /// Human-readable tier name ("defaults", "site", "host")
    pub name: String,
    /// File the tier was read from, if any
    pub source: Option<PathBuf>,
    /// Parsed document
    pub table: Table,
}

/// Ordered stack of configuration tiers, lowest priority first
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    tiers: Vec<ConfigTier>,
}

impl LayeredConfig {
    /// An empty stack with no tiers at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack holding only the built-in defaults.
    pub fn with_defaults() -> Self {
        let mut layers = Self::new();
        let table: Table = DEFAULT_CONFIG
            .parse()
            .unwrap_or_else(|e| panic!("built-in default configuration is invalid: {}", e));
        layers.tiers.push(ConfigTier {
            name: "defaults".to_string(),
            source: None,
            table,
        });
        layers
    }

    /// Parse `content` and push it as the highest-priority tier.
    pub fn push_str(
        &mut self,
        name: impl Into<String>,
        source: Option<&Path>,
        content: &str,
    ) -> Result<()> {
        let table: Table = toml::from_str(content).map_err(|e| MastError::ConfigParse {
            path: source
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("<inline>")),
            source: e,
        })?;
        self.tiers.push(ConfigTier {
            name: name.into(),
            source: source.map(Path::to_path_buf),
            table,
        });
        Ok(())
    }

    /// Read `path` and push it as a tier. Missing files are skipped.
    ///
    /// Returns whether the file was present.
    pub fn push_optional_file(&mut self, name: impl Into<String>, path: &Path) -> Result<bool> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(MastError::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        self.push_str(name, Some(path), &content)?;
        Ok(true)
    }

    /// Defaults, then the site file, then the host file for `unit`.
    ///
    /// Both files are optional.
    pub fn load(site_config: &Path, unit: &str) -> Result<Self> {
        let mut layers = Self::with_defaults();
        layers.push_optional_file("site", site_config)?;
        layers.push_optional_file("host", &super::host_config_path(site_config, unit))?;
        Ok(layers)
    }

    /// Tiers in priority order (lowest first).
    pub fn tiers(&self) -> &[ConfigTier] {
        &self.tiers
    }

    /// Files that contributed to this configuration.
    pub fn sources(&self) -> Vec<&Path> {
        self.tiers
            .iter()
            .filter_map(|tier| tier.source.as_deref())
            .collect()
    }

    /// Merge every tier into a single document.
    pub fn merged(&self) -> Table {
        let mut merged = Table::new();
        for tier in &self.tiers {
            deep_merge(&mut merged, &tier.table);
        }
        merged
    }

    /// Merge all tiers and specialize the result for `unit`.
    ///
    /// A document that does not match the model is reported against the
    /// first tier whose merge makes it fail.
    pub fn resolve(&self, unit: &str) -> Result<UnitConfig> {
        UnitConfig::from_table(self.merged(), unit).map_err(|e| match e {
            MastError::ConfigParse { source, .. } => MastError::ConfigParse {
                path: self.failing_tier(unit),
                source,
            },
            other => other,
        })
    }

    fn failing_tier(&self, unit: &str) -> PathBuf {
        let mut merged = Table::new();
        for tier in &self.tiers {
            deep_merge(&mut merged, &tier.table);
            if UnitConfig::from_table(merged.clone(), unit).is_err() {
                return tier
                    .source
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(format!("<{}>", tier.name)));
            }
        }
        PathBuf::from("<merged>")
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Tables present on both sides are merged key by key; everything else in
/// `overlay` replaces what `base` had.
pub fn deep_merge(base: &mut Table, overlay: &Table) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
