//! Tracing setup for the daemon
//!
//! Console output always; a daily-rotated file under `<top_folder>/logs/`
//! when that directory can be created.

use mast_core::LogLevel;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix of the rotated log files
const LOG_FILE_PREFIX: &str = "mast-unitd.log";

/// Directory that receives the daemon's log files
pub(crate) fn log_dir(top_folder: &Path) -> PathBuf {
    top_folder.join("logs")
}

/// Filter used when `RUST_LOG` is not set.
///
/// `--verbose` forces debug; otherwise `global.log_level` applies.
pub(crate) fn default_directive(verbose: bool, level: LogLevel) -> &'static str {
    if verbose {
        "debug"
    } else {
        level.filter_directive()
    }
}

/// Initialize tracing subscriber for logging.
///
/// Keep the returned guard alive for the life of the process, or buffered
/// file output is lost.
pub(crate) fn init_tracing(verbose: bool, level: LogLevel, top_folder: &Path) -> Option<WorkerGuard> {
    let directive = default_directive(verbose, level);
    let filter = if verbose {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    };

    let dir = log_dir(top_folder);
    let (file_layer, guard, file_error) = match std::fs::create_dir_all(&dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("File logging disabled, cannot create {}: {}", dir.display(), e);
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_wins_over_config() {
        assert_eq!(default_directive(true, LogLevel::Error), "debug");
    }

    #[test]
    fn test_config_level_maps_to_tracing() {
        assert_eq!(default_directive(false, LogLevel::Warning), "warn");
        assert_eq!(default_directive(false, LogLevel::Critical), "error");
        assert_eq!(default_directive(false, LogLevel::Info), "info");
    }

    #[test]
    fn test_log_dir() {
        assert_eq!(
            log_dir(Path::new("C:/MAST")),
            PathBuf::from("C:/MAST").join("logs")
        );
    }
}
