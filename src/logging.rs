//! Logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Installed once by the binary. Library code only emits events.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    /// Append to a file.
    File(&'a Path),
    Stderr,
}

/// Keeps the non-blocking file writer alive. Dropping it flushes the log.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

/// Default filter directive: `debug` when verbose, `info` otherwise.
/// `RUST_LOG` takes precedence over both.
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Install the global subscriber.
pub fn init(target: LogTarget<'_>, verbose: bool) -> anyhow::Result<LoggingGuard> {
    match target {
        LogTarget::File(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log path {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir).map_err(|e| {
                anyhow::anyhow!("failed to create log directory {}: {e}", dir.display())
            })?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .init();
            Ok(LoggingGuard {
                _guard: Some(guard),
            })
        }
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(LoggingGuard { _guard: None })
        }
    }
}
