//! Shared domain types for MAST units

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MastError, Result};

/// Devices that draw power from the unit's power switch.
///
/// The names are the ones expected as values in `power_switch.outlets`.
pub const POWERED_DEVICES: [&str; 5] = ["Mount", "Camera", "Stage", "Covers", "Focuser"];

/// Log verbosity accepted in `global.log_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// All accepted values, in increasing severity
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Canonical configuration spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    ///
    /// `tracing` has no "critical" level, so it collapses onto "error".
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = MastError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or_else(|| {
                MastError::InvalidInput(format!(
                    "invalid log level '{}' (expected one of: debug, info, warning, error, critical)",
                    s
                ))
            })
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// State of a single power-switch outlet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutletState {
    Off,
    On,
    /// The switch could not be queried
    Unknown,
}

impl OutletState {
    pub fn from_bool(on: bool) -> Self {
        if on {
            OutletState::On
        } else {
            OutletState::Off
        }
    }
}

impl fmt::Display for OutletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutletState::Off => "Off",
            OutletState::On => "On",
            OutletState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// How an API caller names an outlet: by its number or by the device plugged into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutletRef {
    Number(u32),
    Name(String),
}

impl FromStr for OutletRef {
    type Err = MastError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MastError::InvalidInput("empty outlet reference".to_string()));
        }
        match s.parse::<u32>() {
            Ok(0) => Err(MastError::InvalidInput(
                "outlet numbers start at 1".to_string(),
            )),
            Ok(n) => Ok(OutletRef::Number(n)),
            Err(_) => Ok(OutletRef::Name(s.to_string())),
        }
    }
}

impl fmt::Display for OutletRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutletRef::Number(n) => write!(f, "{}", n),
            OutletRef::Name(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse_is_case_insensitive() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(" critical ".parse::<LogLevel>().unwrap(), LogLevel::Critical);
    }

    #[test]
    fn test_log_level_rejects_unknown_values() {
        assert!("warn".parse::<LogLevel>().is_err());
        assert!("trace".parse::<LogLevel>().is_err());
        assert!("".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_filter_directive() {
        assert_eq!(LogLevel::Warning.filter_directive(), "warn");
        assert_eq!(LogLevel::Critical.filter_directive(), "error");
        assert_eq!(LogLevel::Debug.filter_directive(), "debug");
    }

    #[test]
    fn test_log_level_serde() {
        #[derive(Deserialize, Serialize)]
        struct Wrapper {
            log_level: LogLevel,
        }

        let w: Wrapper = toml::from_str(r#"log_level = "INFO""#).unwrap();
        assert_eq!(w.log_level, LogLevel::Info);
        assert_eq!(toml::to_string(&w).unwrap().trim(), r#"log_level = "info""#);

        let bad = toml::from_str::<Wrapper>(r#"log_level = "verbose""#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_outlet_ref_parse() {
        assert_eq!("3".parse::<OutletRef>().unwrap(), OutletRef::Number(3));
        assert_eq!(
            "Camera".parse::<OutletRef>().unwrap(),
            OutletRef::Name("Camera".to_string())
        );
        assert!("0".parse::<OutletRef>().is_err());
        assert!("  ".parse::<OutletRef>().is_err());
    }

    #[test]
    fn test_outlet_state_from_bool() {
        assert_eq!(OutletState::from_bool(true), OutletState::On);
        assert_eq!(OutletState::from_bool(false), OutletState::Off);
        assert_eq!(OutletState::Unknown.to_string(), "Unknown");
    }
}
