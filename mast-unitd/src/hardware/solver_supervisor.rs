//! Keeps the PlaneWave solver server available to the unit
//!
//! At startup an instance already listening on the solver port is adopted
//! as is. Otherwise one is launched and waited for. Only a launched instance
//! is killed when the daemon stops.

use chrono::NaiveDate;
use mast_core::api::{SolveRequest, SolverOrigin, SolverStatusResponse};
use mast_core::{MastError, Result, SolverConfig};
use mast_hardware::{
    is_listening, wait_until_listening, PlatesolveParams, Ps3CliClient, SolverLaunch,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// How long a port check may take
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Delay between port checks while a launched solver starts up
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Timeout of one protocol exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a solver launched on `date` writes its output
pub(crate) fn solver_log_paths(top_folder: &Path, date: NaiveDate) -> (PathBuf, PathBuf) {
    let dir = top_folder.join(date.format("%Y-%m-%d").to_string());
    (dir.join("solver-stdout.txt"), dir.join("solver-stderr.txt"))
}

struct SupervisorState {
    origin: SolverOrigin,
    child: Option<Child>,
}

pub(crate) struct SolverSupervisor {
    config: SolverConfig,
    top_folder: PathBuf,
    state: Mutex<SupervisorState>,
}

impl SolverSupervisor {
    pub fn new(config: SolverConfig, top_folder: PathBuf) -> Self {
        Self {
            config,
            top_folder,
            state: Mutex::new(SupervisorState {
                origin: SolverOrigin::Absent,
                child: None,
            }),
        }
    }

    pub fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    /// Adopt a running solver or launch one.
    ///
    /// A launched solver that does not open its port within
    /// `startup_timeout` is still tracked, so that it is killed on shutdown.
    pub async fn start(&self) -> Result<SolverOrigin> {
        let endpoint = self.endpoint();
        let mut state = self.state.lock().await;

        if is_listening(&endpoint, CONNECT_TIMEOUT).await {
            info!("Solver already running on {}, adopting it", endpoint);
            state.origin = SolverOrigin::Adopted;
            return Ok(state.origin);
        }

        if !self.config.autostart {
            warn!("No solver on {} and autostart is off", endpoint);
            return Ok(SolverOrigin::Absent);
        }

        let (stdout_log, stderr_log) =
            solver_log_paths(&self.top_folder, chrono::Local::now().date_naive());
        let launch = SolverLaunch::from_config(&self.config, stdout_log, stderr_log);
        let child = launch.spawn()?;
        state.origin = SolverOrigin::Spawned;
        state.child = Some(child);
        drop(state);

        wait_until_listening(
            &endpoint,
            Duration::from_secs(self.config.startup_timeout),
            POLL_INTERVAL,
        )
        .await?;
        info!("Solver is listening on {}", endpoint);
        Ok(SolverOrigin::Spawned)
    }

    /// Supervisor state plus the solver's own `platesolve_status`.
    pub async fn status(&self) -> SolverStatusResponse {
        let endpoint = self.endpoint();
        let (origin, pid) = {
            let mut state = self.state.lock().await;
            reap_exited(&mut state);
            (state.origin, state.child.as_ref().map(Child::id))
        };

        let reachable = is_listening(&endpoint, CONNECT_TIMEOUT).await;
        let (platesolve, error) = if reachable {
            match self.client().await {
                Ok(mut client) => match client.platesolve_status().await {
                    Ok(status) => (Some(status), None),
                    Err(e) => (None, Some(e.to_string())),
                },
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, Some(format!("nothing listens on {}", endpoint)))
        };

        SolverStatusResponse {
            endpoint,
            origin,
            pid,
            reachable,
            platesolve,
            error,
        }
    }

    /// Start solving an image file; the outcome shows up in [`Self::status`].
    pub async fn solve(&self, request: &SolveRequest) -> Result<Value> {
        if request.image_file_path.trim().is_empty() {
            return Err(MastError::InvalidInput(
                "image_file_path must not be empty".to_string(),
            ));
        }
        if request.arcsec_per_pixel.is_nan() || request.arcsec_per_pixel <= 0.0 {
            return Err(MastError::InvalidInput(format!(
                "arcsec_per_pixel must be positive, got {}",
                request.arcsec_per_pixel
            )));
        }

        let mut params =
            PlatesolveParams::file(request.image_file_path.clone(), request.arcsec_per_pixel);
        params.ra_guess_j2000_rads = request.ra_guess_j2000_rads;
        params.dec_guess_j2000_rads = request.dec_guess_j2000_rads;
        params.enable_all_sky_match = request.enable_all_sky_match;

        info!(
            "Plate solving {} at {}\"/px",
            request.image_file_path, request.arcsec_per_pixel
        );
        self.client().await?.begin_platesolve(&params).await
    }

    pub async fn cancel(&self) -> Result<Value> {
        info!("Cancelling plate solve");
        self.client().await?.platesolve_cancel().await
    }

    async fn client(&self) -> Result<Ps3CliClient> {
        Ps3CliClient::connect(&self.endpoint(), REQUEST_TIMEOUT).await
    }

    /// Kill the solver if this daemon launched it.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let Some(mut child) = state.child.take() else {
            if state.origin == SolverOrigin::Adopted {
                info!("Leaving adopted solver running");
            }
            return;
        };

        info!("Stopping solver (pid={})", child.id());
        if let Err(e) = child.kill() {
            warn!("Failed to kill solver: {}", e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap solver: {}", e);
        }
        state.origin = SolverOrigin::Absent;
    }
}

/// Forget a launched solver that has exited on its own.
fn reap_exited(state: &mut SupervisorState) {
    let exited = match state.child.as_mut().map(Child::try_wait) {
        Some(Ok(Some(status))) => {
            error!("Solver exited unexpectedly: {}", status);
            true
        }
        Some(Err(e)) => {
            warn!("Cannot query solver process: {}", e);
            false
        }
        _ => false,
    };
    if exited {
        state.child = None;
        state.origin = SolverOrigin::Absent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Solver stand-in answering every request with `reply`.
    async fn fake_solver(reply: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 512];
                    loop {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            buf.clear();
                            if socket.write_all(reply.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        port
    }

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn config(port: u16, install_dir: &Path, executable: &str) -> SolverConfig {
        SolverConfig {
            install_dir: install_dir.to_path_buf(),
            executable: executable.to_string(),
            host: "127.0.0.1".to_string(),
            port,
            startup_timeout: 0,
            autostart: true,
        }
    }

    #[test]
    fn test_log_paths_are_dated() {
        let date = NaiveDate::from_ymd_opt(2024, 8, 29).unwrap();
        let (out, err) = solver_log_paths(Path::new("/var/mast"), date);
        assert_eq!(out, PathBuf::from("/var/mast/2024-08-29/solver-stdout.txt"));
        assert_eq!(err, PathBuf::from("/var/mast/2024-08-29/solver-stderr.txt"));
    }

    #[tokio::test]
    async fn test_adopts_running_solver() {
        let dir = TempDir::new().unwrap();
        let port = fake_solver("{\"result\": {\"state\": \"idle\"}}\r\n\r\n").await;
        let supervisor =
            SolverSupervisor::new(config(port, dir.path(), "absent.exe"), dir.path().into());

        assert_eq!(supervisor.start().await.unwrap(), SolverOrigin::Adopted);

        let status = supervisor.status().await;
        assert!(status.reachable);
        assert_eq!(status.origin, SolverOrigin::Adopted);
        assert_eq!(status.pid, None);
        assert_eq!(status.platesolve, Some(serde_json::json!({"state": "idle"})));

        // adopted instances survive shutdown
        supervisor.shutdown().await;
        assert_eq!(supervisor.status().await.origin, SolverOrigin::Adopted);
    }

    #[tokio::test]
    async fn test_autostart_off_leaves_solver_absent() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(free_port().await, dir.path(), "absent.exe");
        cfg.autostart = false;
        let supervisor = SolverSupervisor::new(cfg, dir.path().into());

        assert_eq!(supervisor.start().await.unwrap(), SolverOrigin::Absent);
        let status = supervisor.status().await;
        assert!(!status.reachable);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_executable_fails_start() {
        let dir = TempDir::new().unwrap();
        let supervisor = SolverSupervisor::new(
            config(free_port().await, dir.path(), "absent.exe"),
            dir.path().into(),
        );

        assert!(matches!(
            supervisor.start().await,
            Err(MastError::Solver(_))
        ));
        assert_eq!(supervisor.status().await.origin, SolverOrigin::Absent);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_solver_is_killed_on_shutdown() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("silent-solver.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let supervisor = SolverSupervisor::new(
            config(free_port().await, dir.path(), "silent-solver.sh"),
            dir.path().into(),
        );

        // the script never listens, so waiting for the port times out
        assert!(matches!(
            supervisor.start().await,
            Err(MastError::Timeout(_))
        ));
        let status = supervisor.status().await;
        assert_eq!(status.origin, SolverOrigin::Spawned);
        assert!(status.pid.is_some());

        supervisor.shutdown().await;
        let status = supervisor.status().await;
        assert_eq!(status.origin, SolverOrigin::Absent);
        assert_eq!(status.pid, None);
    }

    #[tokio::test]
    async fn test_solve_forwards_request() {
        let dir = TempDir::new().unwrap();
        let port = fake_solver("{\"result\": null}\r\n\r\n").await;
        let supervisor =
            SolverSupervisor::new(config(port, dir.path(), "absent.exe"), dir.path().into());

        let request = SolveRequest {
            image_file_path: "C:/MAST/images/focus.fits".to_string(),
            arcsec_per_pixel: 0.27,
            ra_guess_j2000_rads: None,
            dec_guess_j2000_rads: None,
            enable_all_sky_match: Some(true),
        };
        assert_eq!(supervisor.solve(&request).await.unwrap(), Value::Null);
        assert_eq!(supervisor.cancel().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_solve_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let supervisor = SolverSupervisor::new(
            config(free_port().await, dir.path(), "absent.exe"),
            dir.path().into(),
        );

        let request = SolveRequest {
            image_file_path: "img.fits".to_string(),
            arcsec_per_pixel: 0.0,
            ra_guess_j2000_rads: None,
            dec_guess_j2000_rads: None,
            enable_all_sky_match: None,
        };
        assert!(matches!(
            supervisor.solve(&request).await,
            Err(MastError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_solver() {
        let dir = TempDir::new().unwrap();
        let supervisor = SolverSupervisor::new(
            config(free_port().await, dir.path(), "absent.exe"),
            dir.path().into(),
        );
        assert!(matches!(
            supervisor.cancel().await,
            Err(MastError::Solver(_))
        ));
    }
}
