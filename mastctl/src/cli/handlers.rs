//! Command execution handlers

use anyhow::{anyhow, Context, Result};
use mast_core::config::{normalize_unit_name, unit_name_from_env};
use mast_core::{default_config_path, LayeredConfig, UnitConfig};
use std::path::{Path, PathBuf};

use crate::client::MastClient;
use crate::config::CliConfig;
use crate::format::format_success;

use super::commands::*;

/// Handle info command
pub async fn handle_info(client: &MastClient, format: &OutputFormat) -> Result<()> {
    let info = client.get_info().await?;
    println!("{}", crate::format::format_info(&info, &format.into())?);
    Ok(())
}

/// Handle power commands
pub async fn handle_power(
    client: &MastClient,
    command: PowerCommands,
    format: &OutputFormat,
) -> Result<()> {
    let output = match command {
        PowerCommands::Status => {
            let status = client.power_status().await?;
            crate::format::format_power_status(&status, &format.into())?
        }
        PowerCommands::On { outlet } => {
            crate::format::format_outlet(&client.outlet_on(&outlet).await?, &format.into())?
        }
        PowerCommands::Off { outlet } => {
            crate::format::format_outlet(&client.outlet_off(&outlet).await?, &format.into())?
        }
        PowerCommands::Cycle { outlet } => {
            crate::format::format_outlet(&client.outlet_cycle(&outlet).await?, &format.into())?
        }
    };
    println!("{}", output);
    Ok(())
}

/// Handle startup command
pub async fn handle_startup(client: &MastClient, format: &OutputFormat) -> Result<()> {
    let response = client.startup().await?;
    println!("{}", crate::format::format_power_sequence(&response, &format.into())?);
    Ok(())
}

/// Handle shutdown command
pub async fn handle_shutdown(client: &MastClient, format: &OutputFormat) -> Result<()> {
    let response = client.shutdown().await?;
    println!("{}", crate::format::format_power_sequence(&response, &format.into())?);
    Ok(())
}

/// Handle solver commands
pub async fn handle_solver(
    client: &MastClient,
    command: SolverCommands,
    format: &OutputFormat,
) -> Result<()> {
    match command {
        SolverCommands::Status => {
            let status = client.solver_status().await?;
            println!("{}", crate::format::format_solver_status(&status, &format.into())?);
        }
    }
    Ok(())
}

/// Handle presets command
pub async fn handle_presets(client: &MastClient, format: &OutputFormat) -> Result<()> {
    let presets = client.presets().await?;
    println!("{}", crate::format::format_presets(&presets, &format.into())?);
    Ok(())
}

/// Load and resolve the unit configuration named by `target`.
pub fn load_unit_config(target: &UnitConfigArgs) -> Result<(PathBuf, UnitConfig)> {
    let unit = target
        .unit
        .as_deref()
        .and_then(normalize_unit_name)
        .or_else(unit_name_from_env)
        .ok_or_else(|| anyhow!("Cannot determine the unit name; pass --unit or set MAST_UNIT"))?;
    let site = target.site.clone().unwrap_or_else(default_config_path);

    let layers = LayeredConfig::load(&site, &unit)
        .with_context(|| format!("Failed to load configuration for unit '{}'", unit))?;
    let config = layers
        .resolve(&unit)
        .with_context(|| format!("Failed to resolve configuration for unit '{}'", unit))?;
    Ok((site, config))
}

/// Handle unit configuration commands
pub fn handle_config(command: ConfigCommands, format: &OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Show { target } => {
            let (_, config) = load_unit_config(&target)?;
            println!(
                "{}",
                crate::format::format_unit_config(&config.redacted(), &format.into())?
            );
            Ok(())
        }
        ConfigCommands::Validate { target } => {
            let (site, config) = load_unit_config(&target)?;
            validate_unit_config(&site, &config, format)
        }
    }
}

/// Print every validation finding; fails when there are errors.
fn validate_unit_config(site: &Path, config: &UnitConfig, format: &OutputFormat) -> Result<()> {
    let report = config.validate();

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "unit": config.unit,
                "site": site.display().to_string(),
                "valid": report.is_valid(),
                "errors": report.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
                "warnings": report.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            println!(
                "{}",
                crate::format::format_validation(&report.errors, &report.warnings)
            );
        }
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(anyhow!(
            "configuration for unit '{}' has {} error(s)",
            config.unit,
            report.errors.len()
        ))
    }
}

/// Handle CLI settings commands
pub fn handle_settings(
    command: SettingsCommands,
    current_config: &CliConfig,
    settings_path: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    match command {
        SettingsCommands::Show => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(current_config)?);
            }
            OutputFormat::Table => {
                println!("CLI Settings:");
                println!("{:<20} Value", "Setting");
                println!("{}", "-".repeat(40));
                println!("{:<20} {}", "Server URL", current_config.server_url);
                println!("{:<20} {}", "Output Format", current_config.output_format);
                println!("{:<20} {}", "Verbose", current_config.verbose);
                println!("{:<20} {}s", "Timeout", current_config.timeout);
            }
        },
        SettingsCommands::Save => {
            let path = match settings_path {
                Some(path) => path.to_path_buf(),
                None => CliConfig::default_path()?,
            };
            current_config.save(&path)?;
            println!(
                "{}",
                format_success(&format!("Settings saved to {}", path.display()))
            );
        }
    }

    Ok(())
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
