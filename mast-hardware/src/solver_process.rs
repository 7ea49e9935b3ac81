//! Launching the PlaneWave ps3cli solver server
//!
//! The solver is a closed-source console program. It is started in its
//! installation directory as `<executable> --server --port=<port>`, without
//! a console window, with stdout and stderr captured to files.

use mast_core::{MastError, Result, SolverConfig};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Everything needed to start one solver process
#[derive(Debug, Clone, PartialEq)]
pub struct SolverLaunch {
    /// Working directory of the child
    pub install_dir: PathBuf,
    /// Executable name or path, resolved against `install_dir` when relative
    pub executable: String,
    /// Port passed as `--port=<port>`
    pub port: u16,
    /// File receiving the child's stdout
    pub stdout_log: PathBuf,
    /// File receiving the child's stderr
    pub stderr_log: PathBuf,
}

impl SolverLaunch {
    /// Launch description from the unit configuration.
    pub fn from_config(config: &SolverConfig, stdout_log: PathBuf, stderr_log: PathBuf) -> Self {
        Self {
            install_dir: config.install_dir.clone(),
            executable: config.executable.clone(),
            port: config.port,
            stdout_log,
            stderr_log,
        }
    }

    /// Command-line arguments, without the program name.
    pub fn args(&self) -> Vec<String> {
        vec!["--server".to_string(), format!("--port={}", self.port)]
    }

    /// Full path of the program to run.
    pub fn program(&self) -> PathBuf {
        let executable = Path::new(&self.executable);
        if executable.is_absolute() {
            executable.to_path_buf()
        } else {
            self.install_dir.join(executable)
        }
    }

    /// Start the solver and return without waiting for it.
    ///
    /// The returned [`Child`] is not killed when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a log file cannot be opened or the process cannot
    /// be started (missing executable or install directory).
    pub fn spawn(&self) -> Result<Child> {
        let stdout = open_log(&self.stdout_log)?;
        let stderr = open_log(&self.stderr_log)?;

        let mut command = Command::new(self.program());
        command
            .args(self.args())
            .current_dir(&self.install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        debug!(
            "Spawning {} {:?} in {}",
            self.program().display(),
            self.args(),
            self.install_dir.display()
        );

        let child = command.spawn().map_err(|e| {
            MastError::Solver(format!(
                "failed to start '{}' in '{}': {}",
                self.program().display(),
                self.install_dir.display(),
                e
            ))
        })?;

        info!(
            "Started solver (pid={}) on port {}, logs: {} / {}",
            child.id(),
            self.port,
            self.stdout_log.display(),
            self.stderr_log.display()
        );
        Ok(child)
    }
}

/// Open a log file for appending, creating parent directories.
fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            MastError::Solver(format!(
                "cannot create log directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MastError::Solver(format!("cannot open log '{}': {}", path.display(), e)))
}

/// Whether something accepts TCP connections on `endpoint` within `timeout`.
pub async fn is_listening(endpoint: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await,
        Ok(Ok(_))
    )
}

/// Poll `endpoint` until it accepts connections or `deadline` passes.
///
/// # Errors
///
/// Returns [`MastError::Timeout`] if the port never opens.
pub async fn wait_until_listening(
    endpoint: &str,
    deadline: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let started = tokio::time::Instant::now();
    loop {
        if is_listening(endpoint, poll_interval).await {
            return Ok(());
        }
        if started.elapsed() >= deadline {
            return Err(MastError::Timeout(format!(
                "solver did not start listening on {} within {}s",
                endpoint,
                deadline.as_secs()
            )));
        }
        info!("Waiting for solver on {} ...", endpoint);
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn launch(dir: &Path, executable: &str) -> SolverLaunch {
        SolverLaunch {
            install_dir: dir.to_path_buf(),
            executable: executable.to_string(),
            port: 9896,
            stdout_log: dir.join("logs").join("solver-stdout.txt"),
            stderr_log: dir.join("logs").join("solver-stderr.txt"),
        }
    }

    #[test]
    fn test_args() {
        let l = launch(Path::new("/opt/ps3cli"), "ps3cli-20240829.exe");
        assert_eq!(l.args(), vec!["--server", "--port=9896"]);
        assert_eq!(
            l.program(),
            PathBuf::from("/opt/ps3cli/ps3cli-20240829.exe")
        );
    }

    #[test]
    fn test_from_config() {
        let config = SolverConfig {
            port: 9900,
            ..SolverConfig::default()
        };
        let l = SolverLaunch::from_config(&config, "out.txt".into(), "err.txt".into());
        assert_eq!(l.executable, "ps3cli-20240829.exe");
        assert_eq!(l.args()[1], "--port=9900");
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = launch(dir.path(), "no-such-solver.exe").spawn().unwrap_err();
        assert!(matches!(err, MastError::Solver(_)));
        // log files were still created before the spawn attempt
        assert!(dir.path().join("logs").join("solver-stdout.txt").exists());
    }

    #[test]
    fn test_missing_install_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut l = launch(dir.path(), "solver");
        l.install_dir = dir.path().join("absent");
        assert!(l.spawn().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_redirects_output() {
        let dir = TempDir::new().unwrap();
        // echo prints the arguments it was started with
        let l = launch(dir.path(), "/bin/echo");
        let mut child = l.spawn().unwrap();
        assert!(child.id() > 0);
        assert!(child.wait().unwrap().success());

        let out = std::fs::read_to_string(&l.stdout_log).unwrap();
        let err = std::fs::read_to_string(&l.stderr_log).unwrap();
        assert_eq!(out.trim(), "--server --port=9896");
        assert!(err.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_logs_are_appended() {
        let dir = TempDir::new().unwrap();
        let l = launch(dir.path(), "/bin/echo");
        l.spawn().unwrap().wait().unwrap();
        l.spawn().unwrap().wait().unwrap();

        let out = std::fs::read_to_string(&l.stdout_log).unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_is_listening() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        assert!(is_listening(&endpoint, Duration::from_secs(1)).await);

        drop(listener);
        assert!(!is_listening(&endpoint, Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn test_wait_until_listening_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = wait_until_listening(
            &endpoint,
            Duration::from_millis(100),
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(MastError::Timeout(_))));
    }
}
