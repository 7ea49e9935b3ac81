//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::Result;
use colored::*;
use mast_core::api::{
    InfoResponse, OutletStatus, PowerActivity, PowerSequenceResponse, PowerStatusResponse,
    PresetsResponse, SolverOrigin, SolverStatusResponse,
};
use mast_core::{OutletState, UnitConfig, ValidationError, ValidationWarning};
use serde_json::Value;

use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
}

fn yes_no(value: bool) -> ColoredString {
    if value {
        "Yes".green()
    } else {
        "No".red()
    }
}

fn colored_state(state: OutletState) -> String {
    match state {
        OutletState::On => "On".green().to_string(),
        OutletState::Off => "Off".dimmed().to_string(),
        OutletState::Unknown => "Unknown".yellow().to_string(),
    }
}

fn colored_activity(activity: PowerActivity) -> ColoredString {
    match activity {
        PowerActivity::Idle => activity.to_string().dimmed(),
        _ => activity.to_string().yellow(),
    }
}

/// Format info response
pub fn format_info(info: &InfoResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(info)?),
        OutputFormat::Table => {
            let mut lines = vec![
                format!("MAST Unit {}", info.unit).bold().to_string(),
                format!("Version: {}", info.version.cyan()),
                format!("Uptime: {} seconds", info.uptime.to_string().yellow()),
                format!("Mock Mode: {}", yes_no(info.mock)),
                format!(
                    "Power Switch: {}",
                    info.power_switch
                        .as_deref()
                        .map(|host| host.cyan())
                        .unwrap_or_else(|| "not configured".red())
                ),
                format!(
                    "Power Driver: {}",
                    info.power_driver
                        .as_deref()
                        .map(|driver| driver.cyan())
                        .unwrap_or_else(|| "none".red())
                ),
                format!("Power Activity: {}", colored_activity(info.power_activity)),
                format!(
                    "Solver: {} (reachable: {})",
                    info.solver_endpoint.cyan(),
                    yes_no(info.solver_reachable)
                ),
            ];
            if !info.site_config.is_empty() {
                lines.push(format!("Site Config: {}", info.site_config));
            }
            for source in &info.config_sources {
                lines.push(format!("Config: {}", source));
            }
            Ok(lines.join("\n"))
        }
    }
}

#[derive(Tabled)]
struct OutletRow {
    #[tabled(rename = "Outlet")]
    number: u32,
    #[tabled(rename = "Device")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&OutletStatus> for OutletRow {
    fn from(outlet: &OutletStatus) -> Self {
        Self {
            number: outlet.number,
            name: outlet.name.cyan().to_string(),
            state: colored_state(outlet.state),
        }
    }
}

/// Format the state of every outlet
pub fn format_power_status(status: &PowerStatusResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            let rows: Vec<OutletRow> = status.outlets.iter().map(OutletRow::from).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();

            let mut output = format!("{}\n{}", "Power Status:".bold(), table);
            output.push_str(&format!("\nOperational: {}", yes_no(status.is_operational)));
            for reason in &status.reasons {
                output.push_str(&format!("\n  {}", reason.yellow()));
            }
            if status.activity != PowerActivity::Idle {
                output.push_str(&format!("\nIn progress: {}", colored_activity(status.activity)));
            }
            if let Some(error) = &status.last_error {
                output.push_str(&format!("\nLast sequence failed: {}", error.red()));
            }
            Ok(output)
        }
    }
}

/// Format the answer to a startup or shutdown request
pub fn format_power_sequence(
    response: &PowerSequenceResponse,
    format: &OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        OutputFormat::Table if response.accepted => Ok(format_success(&format!(
            "Unit is {}; follow progress with `mastctl power status`",
            response.activity
        ))),
        OutputFormat::Table => Ok(format!(
            "{} Request ignored, unit is already {}",
            "!".yellow().bold(),
            response.activity
        )),
    }
}

/// Format the result of switching one outlet
pub fn format_outlet(outlet: &OutletStatus, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outlet)?),
        OutputFormat::Table => Ok(format_success(&format!(
            "Outlet {} ({}) is {}",
            outlet.number,
            outlet.name,
            colored_state(outlet.state)
        ))),
    }
}

/// Format solver supervisor status
pub fn format_solver_status(status: &SolverStatusResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            let origin = match status.origin {
                SolverOrigin::Spawned => "spawned by the daemon".green(),
                SolverOrigin::Adopted => "already running".cyan(),
                SolverOrigin::Absent => "not running".red(),
            };

            let mut lines = vec![
                "Solver Status".bold().to_string(),
                format!("Endpoint: {}", status.endpoint.cyan()),
                format!("Origin: {}", origin),
                format!("Reachable: {}", yes_no(status.reachable)),
            ];
            if let Some(pid) = status.pid {
                lines.push(format!("PID: {}", pid.to_string().yellow()));
            }
            if let Some(platesolve) = &status.platesolve {
                lines.push(format!("Plate solve: {}", platesolve));
            }
            if let Some(error) = &status.error {
                lines.push(format!("Error: {}", error.red()));
            }
            Ok(lines.join("\n"))
        }
    }
}

/// Format stage presets
pub fn format_presets(presets: &PresetsResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(presets)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct PresetRow {
                #[tabled(rename = "Preset")]
                name: String,
                #[tabled(rename = "Position")]
                position: i64,
            }

            let rows: Vec<PresetRow> = presets
                .presets
                .iter()
                .map(|(name, &position)| PresetRow {
                    name: name.cyan().to_string(),
                    position,
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!("{}\n{}", "Stage Presets:".bold(), table))
        }
    }
}

/// Flatten a JSON document into `section.key = value` pairs.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Null => {}
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

/// Format an effective (already redacted) unit configuration
pub fn format_unit_config(config: &UnitConfig, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct SettingRow {
                #[tabled(rename = "Setting")]
                key: String,
                #[tabled(rename = "Value")]
                value: String,
            }

            let mut pairs = Vec::new();
            flatten("", &serde_json::to_value(config)?, &mut pairs);
            let rows: Vec<SettingRow> = pairs
                .into_iter()
                .map(|(key, value)| SettingRow {
                    key: key.cyan().to_string(),
                    value,
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!(
                "{}\n{}",
                format!("Configuration for {}:", config.unit).bold(),
                table
            ))
        }
    }
}

/// Format a validation outcome: every error, then every warning
pub fn format_validation(errors: &[ValidationError], warnings: &[ValidationWarning]) -> String {
    let mut lines = Vec::new();
    for error in errors {
        lines.push(format!("{} {}", "error:".red().bold(), error));
    }
    for warning in warnings {
        lines.push(format!("{} {}", "warning:".yellow().bold(), warning));
    }
    if errors.is_empty() {
        lines.push(format_success("Configuration is valid"));
    } else {
        lines.push(format!(
            "{} {} error(s)",
            "✗".red().bold(),
            errors.len()
        ));
    }
    lines.join("\n")
}

/// Format success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}
