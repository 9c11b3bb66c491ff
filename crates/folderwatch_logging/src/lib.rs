//! Shared logging utilities for folderwatch binaries.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Daily files kept in the logs directory.
const MAX_LOG_FILES: usize = 5;

/// Crates whose debug output is noise at our verbose level.
const QUIET_TARGETS: &str = "lapin=warn,amq_protocol=warn,pinky_swear=warn";

/// Logging configuration shared by folderwatch binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug level for folderwatch crates
    pub verbose: bool,
    /// Human-readable console output at info level; JSON lines at warn otherwise
    pub dev: bool,
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(config: &LogConfig<'_>) -> String {
    let level = if config.verbose {
        "debug"
    } else if config.dev {
        "info"
    } else {
        "warn"
    };
    format!("{},{}", level, QUIET_TARGETS)
}

/// Keeps the background file writer alive; logs are flushed when dropped.
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LogGuard {
    /// Directory receiving the daily log files, if file logging is active.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Daily-rotated `<app>.<date>.log` appender keeping the last few files.
pub fn file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Initialize tracing with stderr output and a daily log file.
///
/// A log directory that cannot be created only disables the file layer.
/// Hold the returned guard until exit.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let default = default_filter(&config);
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default));

    let console_layer = if config.dev {
        fmt::layer()
            .with_writer(io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(filter())
            .boxed()
    };

    let mut guard = LogGuard {
        _worker: None,
        log_dir: None,
    };
    let appender = ensure_logs_dir().and_then(|dir| Ok((file_appender(&dir, config.app_name)?, dir)));
    let file_layer = match appender {
        Ok((appender, dir)) => {
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = LogGuard {
                _worker: Some(worker),
                log_dir: Some(dir),
            };
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        Err(err) => {
            eprintln!("Warning: file logging disabled: {:#}", err);
            None
        }
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(dir) = guard.log_dir() {
        tracing::debug!(log_dir = %dir.display(), "File logging enabled");
    }
    Ok(guard)
}

/// Get the folderwatch home directory: ~/.folderwatch
pub fn folderwatch_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("FOLDERWATCH_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".folderwatch"))
        .context("Could not determine home directory (set FOLDERWATCH_HOME)")
}

/// Get the logs directory: ~/.folderwatch/logs
pub fn logs_dir() -> Result<PathBuf> {
    Ok(folderwatch_home()?.join("logs"))
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
