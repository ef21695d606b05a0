//! # Structured Logging Module
//!
//! Process-level structured logging for subsweep using the `tracing`
//! ecosystem: configurable level, console and/or rotated file output, and
//! optional JSON formatting. Configured from `SUBSWEEP_LOG_*` environment
//! variables.
//!
//! This is distinct from the per-run log tail: runs keep their own bounded
//! ring buffer exposed through status snapshots, while this module covers
//! operator-facing diagnostics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SubsweepError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output to console
    pub console: bool,
    /// Whether to output in JSON format
    pub json: bool,
    /// Log file path (optional)
    pub file_path: Option<PathBuf>,
    /// Number of rotated log files to keep
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            json: false,
            file_path: None,
            max_files: 5,
        }
    }
}

impl LogConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("SUBSWEEP_LOG_LEVEL") {
            config.level = level;
        }

        if let Ok(console) = std::env::var("SUBSWEEP_LOG_CONSOLE") {
            config.console = console
                .parse::<bool>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_LOG_CONSOLE value"))?;
        }

        if let Ok(json) = std::env::var("SUBSWEEP_LOG_JSON") {
            config.json = json
                .parse::<bool>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_LOG_JSON value"))?;
        }

        if let Ok(file_path) = std::env::var("SUBSWEEP_LOG_FILE") {
            config.file_path = Some(PathBuf::from(file_path));
        }

        if let Ok(max_files) = std::env::var("SUBSWEEP_LOG_MAX_FILES") {
            config.max_files = max_files
                .parse::<usize>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_LOG_MAX_FILES value"))?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(SubsweepError::config(format!(
                "Invalid log level '{}'. Valid levels: {}",
                self.level,
                valid_levels.join(", ")
            )));
        }

        if self.max_files == 0 {
            return Err(SubsweepError::config("Max files must be greater than 0"));
        }

        Ok(())
    }
}

/// Initialize structured logging with the given configuration.
///
/// Returns worker guards that must be kept in scope for the duration of
/// the program so buffered file output is flushed.
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>> {
    config.validate()?;

    let mut guards = Vec::new();
    let mut layers = Vec::new();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.console {
        let console_layer = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed()
        };
        layers.push(console_layer.with_filter(env_filter.clone()));
    }

    if let Some(file_path) = &config.file_path {
        let file_appender = tracing_appender::rolling::Builder::new()
            .rotation(tracing_appender::rolling::Rotation::HOURLY)
            .filename_prefix("subsweep")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(
                file_path
                    .parent()
                    .unwrap_or_else(|| std::path::Path::new(".")),
            )
            .map_err(|e| SubsweepError::config(format!("Failed to create log appender: {}", e)))?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        let file_layer = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_target(true)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .boxed()
        };
        layers.push(file_layer.with_filter(env_filter));
    }

    tracing_subscriber::registry().with(layers).init();

    tracing::debug!(
        level = %config.level,
        console = config.console,
        json = config.json,
        file_path = ?config.file_path,
        "Logging initialized"
    );

    Ok(guards)
}
