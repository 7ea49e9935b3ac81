//! Validation of a resolved unit configuration
//!
//! Every problem is collected before reporting. Errors make the
//! configuration unusable; warnings are logged by the caller and ignored.

use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use thiserror::Error;

use super::power_switch::parse_outlet_key;
use super::unit_config::{NetworkConfig, UnitConfig};
use crate::types::POWERED_DEVICES;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The unit daemon and the solver would bind the same port
    #[error("server port {port} collides with the solver port")]
    PortCollision { port: u16 },

    /// Port 0 cannot be connected to
    #[error("[{section}] port must not be 0")]
    ZeroPort { section: String },

    /// Outlet key is not a positive integer
    #[error("outlet key '{key}' is not a positive integer")]
    InvalidOutletKey { key: String },

    /// Two keys designate the same outlet, e.g. "1" and "01"
    #[error("outlet {number} is defined more than once ({keys:?})")]
    DuplicateOutlet { number: u32, keys: Vec<String> },

    /// Outlet mapped to an empty device name
    #[error("outlet '{key}' has an empty device name")]
    EmptyOutletName { key: String },

    /// Zero-second switch timing
    #[error("power_switch.{field} must be greater than 0")]
    ZeroPowerSwitchTiming { field: &'static str },

    /// Address or mask is not a dotted IPv4 address
    #[error("network.{field} '{value}' is not an IPv4 address")]
    InvalidIpv4 { field: &'static str, value: String },

    /// Mask bits are not contiguous
    #[error("network.mask '{mask}' is not a contiguous subnet mask")]
    NonContiguousMask { mask: String },

    /// CIDR prefix out of range
    #[error("network.prefix {prefix} is out of range (0-32)")]
    PrefixOutOfRange { prefix: u8 },

    /// Mask and prefix describe different subnets
    #[error("network.prefix /{prefix} does not match mask {mask} (/{mask_prefix})")]
    PrefixMaskMismatch {
        prefix: u8,
        mask: String,
        mask_prefix: u8,
    },
}

/// Non-fatal configuration findings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("device '{name}' is plugged into several outlets: {outlets:?}")]
    DeviceOnSeveralOutlets { name: String, outlets: Vec<u32> },

    #[error("device '{name}' has no power outlet")]
    DeviceWithoutOutlet { name: String },

    #[error("[stage] defines no position presets")]
    NoStagePresets,

    #[error("no power switch host configured for unit '{unit}'")]
    NoPowerSwitchHost { unit: String },
}

/// Collected validation findings
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    fn error(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    fn warn(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Warnings on success, every error on failure.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(self.errors)
        }
    }
}

impl UnitConfig {
    /// Check the cross-field rules serde cannot express.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        validate_ports(self, &mut report);
        validate_power_switch(self, &mut report);
        if let Some(network) = &self.network {
            validate_network(network, &mut report);
        }
        if self.stage.presets.is_empty() {
            report.warn(ValidationWarning::NoStagePresets);
        }

        report
    }
}

fn validate_ports(config: &UnitConfig, report: &mut ValidationReport) {
    if config.server.port == 0 {
        report.error(ValidationError::ZeroPort {
            section: "server".to_string(),
        });
    }
    if config.solver.port == 0 {
        report.error(ValidationError::ZeroPort {
            section: "solver".to_string(),
        });
    }
    // Both processes run on the unit's control machine
    if config.server.port != 0 && config.server.port == config.solver.port {
        report.error(ValidationError::PortCollision {
            port: config.server.port,
        });
    }
}

fn validate_power_switch(config: &UnitConfig, report: &mut ValidationReport) {
    let switch = &config.power_switch;

    if switch.timeout == 0 {
        report.error(ValidationError::ZeroPowerSwitchTiming { field: "timeout" });
    }
    if switch.cycle_time == 0 {
        report.error(ValidationError::ZeroPowerSwitchTiming {
            field: "cycle_time",
        });
    }
    if switch.host.is_none() {
        report.warn(ValidationWarning::NoPowerSwitchHost {
            unit: config.unit.clone(),
        });
    }

    let mut keys_by_number: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut outlets_by_name: BTreeMap<String, Vec<u32>> = BTreeMap::new();

    for (key, name) in &switch.outlets {
        let Some(number) = parse_outlet_key(key) else {
            report.error(ValidationError::InvalidOutletKey { key: key.clone() });
            continue;
        };
        keys_by_number.entry(number).or_default().push(key.clone());

        if name.trim().is_empty() {
            report.error(ValidationError::EmptyOutletName { key: key.clone() });
            continue;
        }
        outlets_by_name
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(number);
    }

    for (number, keys) in keys_by_number {
        if keys.len() > 1 {
            report.error(ValidationError::DuplicateOutlet { number, keys });
        }
    }

    for (name, outlets) in &outlets_by_name {
        if outlets.len() > 1 {
            report.warn(ValidationWarning::DeviceOnSeveralOutlets {
                name: name.clone(),
                outlets: outlets.clone(),
            });
        }
    }

    for device in POWERED_DEVICES {
        if !outlets_by_name.contains_key(&device.to_ascii_lowercase()) {
            report.warn(ValidationWarning::DeviceWithoutOutlet {
                name: device.to_string(),
            });
        }
    }
}

fn validate_network(network: &NetworkConfig, report: &mut ValidationReport) {
    if network.address.parse::<Ipv4Addr>().is_err() {
        report.error(ValidationError::InvalidIpv4 {
            field: "address",
            value: network.address.clone(),
        });
    }

    if network.prefix > 32 {
        report.error(ValidationError::PrefixOutOfRange {
            prefix: network.prefix,
        });
    }

    let Ok(mask) = network.mask.parse::<Ipv4Addr>() else {
        report.error(ValidationError::InvalidIpv4 {
            field: "mask",
            value: network.mask.clone(),
        });
        return;
    };

    let Some(mask_prefix) = mask_prefix_len(mask) else {
        report.error(ValidationError::NonContiguousMask {
            mask: network.mask.clone(),
        });
        return;
    };

    if network.prefix <= 32 && mask_prefix != network.prefix {
        report.error(ValidationError::PrefixMaskMismatch {
            prefix: network.prefix,
            mask: network.mask.clone(),
            mask_prefix,
        });
    }
}

/// Prefix length of a contiguous netmask, `None` for masks like 255.0.255.0.
fn mask_prefix_len(mask: Ipv4Addr) -> Option<u8> {
    let prefix = u32::from(mask).leading_ones() as u8;
    let canonical = Ipv4Net::new(Ipv4Addr::UNSPECIFIED, prefix).ok()?.netmask();
    (canonical == mask).then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml_str: &str) -> UnitConfig {
        UnitConfig::from_toml(toml_str, "mast01").unwrap()
    }

    const VALID: &str = r#"
        [stage.presets]
        spectra = 100000

        [power_switch]
        host = "mast01-ps"

        [power_switch.outlets]
        1 = "Mount"
        2 = "Camera"
        3 = "Stage"
        4 = "Covers"
        5 = "Focuser"

        [network]
        interface = "Ethernet"
        address = "10.23.1.1"
        mask = "255.255.0.0"
        prefix = 16
    "#;

    #[test]
    fn test_valid_config_has_no_findings() {
        let report = config(VALID).validate();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_port_collision() {
        let report = config("[server]\nport = 9896").validate();
        assert!(report
            .errors
            .contains(&ValidationError::PortCollision { port: 9896 }));

        let report = config("[solver]\nport = 8000").validate();
        assert!(report
            .errors
            .contains(&ValidationError::PortCollision { port: 8000 }));
    }

    #[test]
    fn test_default_ports_do_not_collide() {
        let report = config("").validate();
        assert!(!report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::PortCollision { .. })));
    }

    #[test]
    fn test_zero_port() {
        let report = config("[server]\nport = 0").validate();
        assert_eq!(
            report.errors,
            vec![ValidationError::ZeroPort {
                section: "server".to_string()
            }]
        );
    }

    #[test]
    fn test_zero_solver_port() {
        let report = config("[solver]\nport = 0").validate();
        assert_eq!(
            report.errors,
            vec![ValidationError::ZeroPort {
                section: "solver".to_string()
            }]
        );
    }

    #[test]
    fn test_outlet_keys_must_be_positive_integers() {
        let report = config(
            r#"
            [power_switch.outlets]
            0 = "Mount"
            two = "Camera"
            3 = "Stage"
            "#,
        )
        .validate();

        assert!(report.errors.contains(&ValidationError::InvalidOutletKey {
            key: "0".to_string()
        }));
        assert!(report.errors.contains(&ValidationError::InvalidOutletKey {
            key: "two".to_string()
        }));
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_duplicate_outlet_numbers() {
        let report = config(
            r#"
            [power_switch.outlets]
            1 = "Mount"
            01 = "Camera"
            "#,
        )
        .validate();

        assert_eq!(
            report.errors,
            vec![ValidationError::DuplicateOutlet {
                number: 1,
                keys: vec!["01".to_string(), "1".to_string()],
            }]
        );
    }

    #[test]
    fn test_duplicate_after_unit_merge_is_caught() {
        // The override uses a different spelling than the generic key;
        // the merge normalizes it so no duplicate survives.
        let cfg = UnitConfig::from_toml(
            r#"
            [power_switch.outlets]
            1 = "Mount"
            [power_switch.mast01.outlets]
            001 = "Camera"
            "#,
            "mast01",
        )
        .unwrap();
        assert!(cfg.validate().is_valid());
        assert_eq!(cfg.power_switch.outlet_map()[&1], "Camera");
    }

    #[test]
    fn test_empty_outlet_name() {
        let report = config("[power_switch.outlets]\n1 = \" \"").validate();
        assert_eq!(
            report.errors,
            vec![ValidationError::EmptyOutletName {
                key: "1".to_string()
            }]
        );
    }

    #[test]
    fn test_zero_switch_timing() {
        let report = config("[power_switch]\ntimeout = 0\ncycle_time = 0").validate();
        assert!(report
            .errors
            .contains(&ValidationError::ZeroPowerSwitchTiming { field: "timeout" }));
        assert!(report
            .errors
            .contains(&ValidationError::ZeroPowerSwitchTiming {
                field: "cycle_time"
            }));
    }

    #[test]
    fn test_warnings_for_missing_and_repeated_devices() {
        let report = config(
            r#"
            [power_switch.outlets]
            1 = "Mount"
            2 = "mount"
            "#,
        )
        .validate();

        assert!(report.is_valid());
        assert!(report
            .warnings
            .contains(&ValidationWarning::DeviceOnSeveralOutlets {
                name: "mount".to_string(),
                outlets: vec![1, 2],
            }));
        assert!(report
            .warnings
            .contains(&ValidationWarning::DeviceWithoutOutlet {
                name: "Camera".to_string()
            }));
        assert!(report.warnings.contains(&ValidationWarning::NoStagePresets));
    }

    fn network_report(address: &str, mask: &str, prefix: u8) -> ValidationReport {
        config(&format!(
            "[network]\ninterface = \"eth0\"\naddress = \"{}\"\nmask = \"{}\"\nprefix = {}",
            address, mask, prefix
        ))
        .validate()
    }

    #[test]
    fn test_network_prefix_must_match_mask() {
        assert!(network_report("10.23.1.1", "255.255.255.0", 24).is_valid());

        let report = network_report("10.23.1.1", "255.255.255.0", 16);
        assert_eq!(
            report.errors,
            vec![ValidationError::PrefixMaskMismatch {
                prefix: 16,
                mask: "255.255.255.0".to_string(),
                mask_prefix: 24,
            }]
        );
    }

    #[test]
    fn test_network_rejects_bad_addresses() {
        let report = network_report("10.23.1", "255.0.255.0", 40);
        assert!(report.errors.contains(&ValidationError::InvalidIpv4 {
            field: "address",
            value: "10.23.1".to_string()
        }));
        assert!(report
            .errors
            .contains(&ValidationError::PrefixOutOfRange { prefix: 40 }));
        assert!(report.errors.contains(&ValidationError::NonContiguousMask {
            mask: "255.0.255.0".to_string()
        }));
    }

    #[test]
    fn test_mask_prefix_len() {
        assert_eq!(mask_prefix_len("255.255.0.0".parse().unwrap()), Some(16));
        assert_eq!(mask_prefix_len("0.0.0.0".parse().unwrap()), Some(0));
        assert_eq!(
            mask_prefix_len("255.255.255.255".parse().unwrap()),
            Some(32)
        );
        assert_eq!(mask_prefix_len("255.255.0.255".parse().unwrap()), None);
    }

    #[test]
    fn test_into_result() {
        let ok = config(VALID).validate().into_result();
        assert!(ok.unwrap().is_empty());

        let err = config("[server]\nport = 0").validate().into_result();
        assert_eq!(err.unwrap_err().len(), 1);
    }
}
