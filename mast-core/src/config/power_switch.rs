//! Power-switch configuration and per-unit overrides
//!
//! The `[power_switch]` section describes a generic switch. Any sub-table
//! other than `outlets` is an override for the unit of that name:
//!
//! ```toml
//! [power_switch]
//! userid = "admin"
//! timeout = 2
//!
//! [power_switch.outlets]
//! 1 = "Mount"
//! 2 = "Camera"
//!
//! [power_switch.mast03]
//! host = "mast03-ps"
//!
//! [power_switch.mast03.outlets]
//! 2 = "Stage"
//! ```
//!
//! The effective switch for a unit is the generic section with the unit's
//! keys replacing generic keys of the same name. `outlets` is merged per
//! outlet number, so `mast03` above keeps outlet 1 as "Mount".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use toml::{Table, Value};

use crate::error::{MastError, Result};

const OUTLETS_KEY: &str = "outlets";

/// Effective settings of one network power switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerSwitchConfig {
    /// Switch host name or address; `None` when the unit has no switch configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// HTTP port of the switch
    pub port: u16,
    /// User id for basic authentication
    pub userid: String,
    /// Password for basic authentication
    pub password: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Seconds an outlet stays off during a power cycle
    pub cycle_time: u64,
    /// Seconds to wait after powering an outlet on
    pub delay_after_on: u64,
    /// Outlet number (as written in the file) -> device name
    pub outlets: BTreeMap<String, String>,
}

impl Default for PowerSwitchConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 80,
            userid: "admin".to_string(),
            password: "1234".to_string(),
            timeout: 2,
            cycle_time: 3,
            delay_after_on: 3,
            outlets: BTreeMap::new(),
        }
    }
}

/// Keys a unit may override; anything left `None` falls back to the generic section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerSwitchOverride {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub userid: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<u64>,
    pub cycle_time: Option<u64>,
    pub delay_after_on: Option<u64>,
    pub outlets: BTreeMap<String, String>,
}

/// The `[power_switch]` section split into its generic part and unit overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerSwitchSection {
    pub generic: PowerSwitchConfig,
    pub units: BTreeMap<String, PowerSwitchOverride>,
}

impl PowerSwitchSection {
    /// Split a raw `[power_switch]` table.
    ///
    /// Sub-tables other than `outlets` are unit overrides; everything else
    /// belongs to the generic switch.
    pub fn from_table(table: &Table) -> std::result::Result<Self, toml::de::Error> {
        let mut generic = Table::new();
        let mut units = BTreeMap::new();

        for (key, value) in table {
            match value {
                Value::Table(unit_table) if key != OUTLETS_KEY => {
                    let unit_override: PowerSwitchOverride =
                        Value::Table(unit_table.clone()).try_into()?;
                    units.insert(key.to_ascii_lowercase(), unit_override);
                }
                _ => {
                    generic.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self {
            generic: Value::Table(generic).try_into()?,
            units,
        })
    }

    /// Effective switch settings for `unit`.
    pub fn for_unit(&self, unit: &str) -> PowerSwitchConfig {
        match self.units.get(&unit.to_ascii_lowercase()) {
            Some(unit_override) => self.generic.with_override(unit_override),
            None => self.generic.clone(),
        }
    }
}

impl PowerSwitchConfig {
    /// Apply a unit override on top of these settings.
    pub fn with_override(&self, o: &PowerSwitchOverride) -> PowerSwitchConfig {
        let mut merged = self.clone();

        if let Some(host) = &o.host {
            merged.host = Some(host.clone());
        }
        if let Some(port) = o.port {
            merged.port = port;
        }
        if let Some(userid) = &o.userid {
            merged.userid = userid.clone();
        }
        if let Some(password) = &o.password {
            merged.password = password.clone();
        }
        if let Some(timeout) = o.timeout {
            merged.timeout = timeout;
        }
        if let Some(cycle_time) = o.cycle_time {
            merged.cycle_time = cycle_time;
        }
        if let Some(delay) = o.delay_after_on {
            merged.delay_after_on = delay;
        }

        for (key, name) in &o.outlets {
            // "01" in an override replaces "1" from the generic section
            if let Some(number) = parse_outlet_key(key) {
                merged
                    .outlets
                    .retain(|existing, _| parse_outlet_key(existing) != Some(number));
            }
            merged.outlets.insert(key.clone(), name.clone());
        }

        merged
    }

    /// Outlets keyed by number. Keys that are not positive integers are skipped;
    /// validation reports them.
    pub fn outlet_map(&self) -> BTreeMap<u32, String> {
        self.outlets
            .iter()
            .filter_map(|(key, name)| parse_outlet_key(key).map(|n| (n, name.clone())))
            .collect()
    }

    /// Outlet number a device is plugged into (case-insensitive name match).
    pub fn outlet_for(&self, device: &str) -> Option<u32> {
        self.outlet_map()
            .into_iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(device))
            .map(|(number, _)| number)
    }

    /// Resolve an outlet by number or device name to `(number, name)`.
    pub fn resolve_outlet(&self, outlet: &crate::OutletRef) -> Result<(u32, String)> {
        let outlets = self.outlet_map();
        let found = match outlet {
            crate::OutletRef::Number(n) => outlets.get(n).map(|name| (*n, name.clone())),
            crate::OutletRef::Name(name) => outlets
                .into_iter()
                .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name)),
        };
        found.ok_or_else(|| MastError::OutletNotFound(outlet.to_string()))
    }

    /// Copy with the password masked, for display and the API.
    pub fn redacted(&self) -> PowerSwitchConfig {
        PowerSwitchConfig {
            password: "********".to_string(),
            ..self.clone()
        }
    }
}

/// Outlet keys are positive integers written as TOML keys.
pub fn parse_outlet_key(key: &str) -> Option<u32> {
    match key.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
