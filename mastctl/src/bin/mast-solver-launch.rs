//! Launch the PlaneWave plate-solving server in the background.
//!
//! Starts the solver executable with `--server --port=<port>` from its
//! install directory, redirects its output to the two log files, prints the
//! child PID and exits without waiting for it.

use anyhow::{Context, Result};
use clap::Parser;
use mast_core::SolverConfig;
use mast_hardware::SolverLaunch;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mast-solver-launch")]
#[command(version, about = "Launch the PlaneWave solver server", long_about = None)]
struct Args {
    /// File receiving the solver's standard output (created or appended)
    #[arg(long)]
    stdout_log_file_path: PathBuf,

    /// File receiving the solver's standard error (created or appended)
    #[arg(long)]
    stderr_log_file_path: PathBuf,

    /// Solver installation directory, used as the working directory
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Executable name inside the installation directory
    #[arg(long)]
    executable: Option<String>,

    /// Port the solver listens on
    #[arg(long)]
    port: Option<u16>,
}

impl Args {
    fn launch(self) -> SolverLaunch {
        let mut config = SolverConfig::default();
        if let Some(install_dir) = self.install_dir {
            config.install_dir = install_dir;
        }
        if let Some(executable) = self.executable {
            config.executable = executable;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        SolverLaunch::from_config(
            &config,
            self.stdout_log_file_path,
            self.stderr_log_file_path,
        )
    }
}

fn main() -> Result<()> {
    let launch = Args::parse().launch();
    let child = launch
        .spawn()
        .with_context(|| format!("Failed to launch {}", launch.program().display()))?;

    println!("{}", child.id());
    Ok(())
}
