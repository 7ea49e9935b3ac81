//! CLI command and subcommand definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MAST Unit CLI
#[derive(Parser, Debug)]
#[command(name = "mastctl")]
#[command(version, about = "MAST Unit CLI", long_about = None)]
pub struct Cli {
    /// Unit daemon URL (overrides config file)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Output format (overrides config file)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging (overrides config file)
    #[arg(short, long)]
    pub verbose: Option<bool>,

    /// Don't load the CLI settings file
    #[arg(long)]
    pub no_config: bool,

    /// CLI settings file path (default: ~/.config/mast/cli.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        }
    }
}

impl From<&OutputFormat> for crate::format::OutputFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show unit daemon information
    Info,

    /// Power switch commands
    Power {
        #[command(subcommand)]
        command: PowerCommands,
    },

    /// Start powering every outlet on, in outlet order
    Startup,

    /// Start powering every outlet off
    Shutdown,

    /// Solver server commands
    Solver {
        #[command(subcommand)]
        command: SolverCommands,
    },

    /// Show stage position presets
    Presets,

    /// Inspect the unit configuration files (does not contact the daemon)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show or save the CLI settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    /// Whether the command talks to the unit daemon
    pub fn needs_server(&self) -> bool {
        !matches!(
            self,
            Commands::Config { .. } | Commands::Settings { .. } | Commands::Completion { .. }
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum PowerCommands {
    /// Show the state of every configured outlet
    Status,

    /// Turn an outlet on
    On {
        /// Outlet number or device name
        outlet: String,
    },

    /// Turn an outlet off
    Off {
        /// Outlet number or device name
        outlet: String,
    },

    /// Turn an outlet off, wait the cycle time, turn it on
    Cycle {
        /// Outlet number or device name
        outlet: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SolverCommands {
    /// Show whether the solver runs and what it is doing
    Status,
}

/// Which unit configuration to load
#[derive(clap::Args, Debug, Clone)]
pub struct UnitConfigArgs {
    /// Site configuration file (default: ~/.config/mast/mast.toml)
    #[arg(long, env = "MAST_CONFIG")]
    pub site: Option<PathBuf>,

    /// Unit name (defaults to MAST_UNIT, then the host name)
    #[arg(short, long)]
    pub unit: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration for a unit
    Show {
        #[command(flatten)]
        target: UnitConfigArgs,
    },

    /// Validate the configuration for a unit; exits 1 on errors
    Validate {
        #[command(flatten)]
        target: UnitConfigArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show the effective CLI settings
    Show,

    /// Write the effective CLI settings to the settings file
    Save,
}
