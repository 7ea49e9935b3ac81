//! MAST CLI
//!
//! Command-line interface for a MAST unit daemon.

use anyhow::Result;
use clap::Parser;
use mastctl::cli::{
    generate_completion, handle_config, handle_info, handle_power, handle_presets,
    handle_settings, handle_shutdown, handle_solver, handle_startup, Cli, Commands, OutputFormat,
};
use mastctl::client::MastClient;
use mastctl::config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build configuration using priority chain: defaults → file → env → CLI args
    let mut builder = CliConfig::builder();

    if !cli.no_config {
        builder = match builder.with_config_file(cli.config.as_deref()) {
            Ok(builder) => builder,
            Err(e) => {
                eprintln!("Configuration error: {:#}", e);
                std::process::exit(1);
            }
        };
    }

    builder = builder.with_env_overrides();

    if let Some(ref server) = cli.server {
        builder = builder.with_server_url(server)?;
    }
    if let Some(ref format) = cli.format {
        builder = builder.with_output_format(format.as_str())?;
    }
    if let Some(verbose) = cli.verbose {
        builder = builder.with_verbose(verbose);
    }

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            if cli.verbose.unwrap_or(false) {
                eprintln!("Error details: {:?}", e);
            }
            std::process::exit(1);
        }
    };

    let output_format = match config.output_format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };
    let verbose = config.verbose;

    if verbose {
        eprintln!("Verbose mode enabled");
        eprintln!("Server URL: {}", config.server_url);
        eprintln!("Output format: {:?}", output_format);
    }

    if verbose && cli.command.needs_server() {
        eprintln!("Connecting to unit daemon at {}", config.server_url);
    }

    // Building the client does not contact the daemon
    let client = match MastClient::with_config(
        config.server_url.clone(),
        config.timeout,
        3,
        std::time::Duration::from_millis(500),
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Info => handle_info(&client, &output_format).await,
        Commands::Power { command } => handle_power(&client, command, &output_format).await,
        Commands::Startup => handle_startup(&client, &output_format).await,
        Commands::Shutdown => handle_shutdown(&client, &output_format).await,
        Commands::Solver { command } => handle_solver(&client, command, &output_format).await,
        Commands::Presets => handle_presets(&client, &output_format).await,
        Commands::Config { command } => handle_config(command, &output_format),
        Commands::Settings { command } => {
            handle_settings(command, &config, cli.config.as_deref(), &output_format)
        }
        Commands::Completion { shell } => {
            generate_completion(shell);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if verbose {
            eprintln!("Error details: {:?}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}
