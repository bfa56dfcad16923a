//! Logging initialization for hearth hosts.
//!
//! Configurable `tracing` setup with optional non-blocking file output.
//! File-based targets buffer through `tracing-appender`, so the returned
//! [`LoggingGuard`] must be held for the life of the process to flush
//! pending logs on exit; stderr-only targets need no guard.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// No logging.
    None,
    /// Stderr only; no guard needed.
    Stderr,
    /// Rolling file only; guard required.
    FileOnly,
    /// Stderr and rolling file; guard required.
    Both,
}

/// File rotation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    /// Rotate hourly.
    Hourly,
    /// Rotate daily.
    Daily,
    /// Single file, never rotated.
    Never,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset, e.g. `info` or
    /// `hearth_host=debug`.
    pub level: String,
    /// Output target.
    pub output: LogOutput,
    /// Emit JSON instead of the human format.
    pub structured: bool,
    /// Directory for file output; required by the file targets.
    pub directory: Option<PathBuf>,
    /// File name prefix for rolling files.
    pub file_prefix: String,
    /// Rotation cadence for file output.
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stderr,
            structured: false,
            directory: None,
            file_prefix: "hearth".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

/// Guard that flushes buffered file logs on drop.
///
/// Hold it for the duration of the program when using a file target;
/// dropping it early may lose pending logs.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Stderr-only logging at `info`.
    pub fn stderr_minimal() -> Self {
        Self::default()
    }

    /// Structured daily-rotated file logging under `directory`.
    pub fn file(directory: impl Into<PathBuf>) -> Self {
        Self {
            output: LogOutput::FileOnly,
            structured: true,
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    /// Initialize logging based on this configuration.
    ///
    /// Returns `Some(LoggingGuard)` for file-based targets (must be held)
    /// or `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created, a file
    /// target lacks a directory, or a subscriber is already installed.
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(None),
            LogOutput::Stderr => {
                self.init_stderr(filter)?;
                Ok(None)
            }
            LogOutput::FileOnly | LogOutput::Both => {
                let dir = self.directory.clone().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "file logging requires a directory",
                    )
                })?;
                Ok(Some(self.init_file(&dir, filter)?))
            }
        }
    }

    fn init_stderr(&self, filter: EnvFilter) -> io::Result<()> {
        let subscriber = tracing_subscriber::registry().with(filter);
        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
        } else {
            subscriber
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
        }
        .map_err(|e| io::Error::other(e.to_string()))
    }

    fn init_file(&self, dir: &std::path::Path, filter: EnvFilter) -> io::Result<LoggingGuard> {
        std::fs::create_dir_all(dir)?;

        let appender = match self.rotation {
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, &self.file_prefix),
            LogRotation::Daily => tracing_appender::rolling::daily(dir, &self.file_prefix),
            LogRotation::Never => tracing_appender::rolling::never(dir, &self.file_prefix),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        let subscriber = tracing_subscriber::registry().with(filter);
        let result = match (self.structured, self.output) {
            (true, LogOutput::Both) => subscriber
                .with(fmt::layer().json().with_writer(non_blocking))
                .with(fmt::layer().with_writer(io::stderr))
                .try_init(),
            (false, LogOutput::Both) => subscriber
                .with(fmt::layer().with_writer(non_blocking))
                .with(fmt::layer().with_writer(io::stderr))
                .try_init(),
            (true, _) => subscriber
                .with(fmt::layer().json().with_writer(non_blocking))
                .try_init(),
            (false, _) => subscriber
                .with(fmt::layer().with_writer(non_blocking))
                .try_init(),
        };
        result.map_err(|e| io::Error::other(e.to_string()))?;

        Ok(LoggingGuard { _file_guard: guard })
    }
}
