//! Default path and unit-name resolution
//!
//! Uses the platform config directory when available, with fallbacks that
//! match the layout of a MAST control machine.

use std::path::{Path, PathBuf};

/// Environment variable naming the unit explicitly.
pub const UNIT_ENV: &str = "MAST_UNIT";

/// Returns the default path for the site configuration file.
///
/// - Windows: `%APPDATA%\mast\mast.toml`
/// - Linux/macOS: `~/.config/mast/mast.toml`
/// - Fallback: `/etc/mast/mast.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("mast")
        .join("mast.toml")
}

/// Path of the host tier for `unit`, next to the site file.
pub fn host_config_path(site_config: &Path, unit: &str) -> PathBuf {
    site_config
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}.toml", unit))
}

/// Determine the unit name from the environment.
///
/// Order: `MAST_UNIT`, `COMPUTERNAME` (Windows), `HOSTNAME`, `/etc/hostname`.
/// Returns `None` when nothing usable is found.
pub fn unit_name_from_env() -> Option<String> {
    for var in [UNIT_ENV, "COMPUTERNAME", "HOSTNAME"] {
        if let Ok(value) = std::env::var(var) {
            if let Some(name) = normalize_unit_name(&value) {
                return Some(name);
            }
        }
    }

    std::fs::read_to_string("/etc/hostname")
        .ok()
        .and_then(|s| normalize_unit_name(&s))
}

/// Unit names are short lowercase host names: `MAST01.weizmann.ac.il` -> `mast01`.
pub fn normalize_unit_name(raw: &str) -> Option<String> {
    let short = raw.trim().split('.').next().unwrap_or_default();
    if short.is_empty() {
        None
    } else {
        Some(short.to_ascii_lowercase())
    }
}
