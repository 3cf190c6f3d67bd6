//! Logging System
//!
//! Structured logging via the `tracing` crate. Level and destination layer
//! the usual way: environment variables beat the configuration file, which
//! beats the defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging configuration: {0}")]
    Invalid(String),

    #[error("failed to open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    pub level: String,

    /// Output format: json, text (default: text)
    pub format: String,

    /// Output destination: stdout, stderr, or file
    pub output: String,

    /// Log file path when output is file; None means the platform default
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: "text".to_string(),
            output: "stderr".to_string(),
            file: None,
        }
    }
}

/// Resolve the log file path: config file entry first, then the platform
/// state directory via `ProjectDirs`.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, LoggingError> {
    if let Some(path) = config_file {
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }
    let project_dirs = directories::ProjectDirs::from("", "hoist", "hoist").ok_or_else(|| {
        LoggingError::Invalid("could not determine platform state directory".to_string())
    })?;
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_dir())
        .to_path_buf();
    Ok(dir.join("hoist.log"))
}

/// Initialize the logging system.
///
/// `HOIST_LOG` overrides the configured level (EnvFilter syntax);
/// `HOIST_LOG_FORMAT` overrides the format.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    if !config.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let base = Registry::default().with(filter);

    match (format.as_str(), config.output.as_str()) {
        ("json", "stdout") => base
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stdout))
            .init(),
        ("json", "stderr") => base
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init(),
        ("json", "file") => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(open_log_file(config)?),
            )
            .init(),
        ("text", "stdout") => base
            .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
            .init(),
        ("text", "stderr") => base
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        ("text", "file") => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(open_log_file(config)?),
            )
            .init(),
        (_, output) => {
            return Err(LoggingError::Invalid(format!(
                "invalid log output: {output} (must be 'stdout', 'stderr', or 'file')"
            )))
        }
    }

    Ok(())
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, LoggingError> {
    let path = resolve_log_file_path(config.file.clone())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LoggingError::File {
            path: path.display().to_string(),
            source,
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::File {
            path: path.display().to_string(),
            source,
        })
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_env("HOIST_LOG") {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|err| LoggingError::Invalid(format!("invalid log level: {err}")))
}

fn determine_format(config: &LoggingConfig) -> Result<String, LoggingError> {
    if let Ok(format) = std::env::var("HOIST_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }
    match config.format.as_str() {
        "json" | "text" => Ok(config.format.clone()),
        other => Err(LoggingError::Invalid(format!(
            "invalid log format: {other} (must be 'json' or 'text')"
        ))),
    }
}
