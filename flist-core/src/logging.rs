//! src/logging.rs
//! ============================================================================
//! # Structured JSON Logging
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` seeded from the
//! configured level and a JSON formatter writing through a non-blocking
//! rolling file appender (`<prefix>.<date>.jsonl`). Engine code only uses
//! the `tracing` macros with `marker` / `operation_type` fields.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::{fs as TokioFs, sync::RwLock};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, filter::Directive, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub max_log_files: usize,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("flist"),
            log_level: CompactString::const_new("info"),
            max_log_files: 10,
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

static LOGGER_INSTALLED: RwLock<bool> = RwLock::const_new(false);

pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.config.log_level = CompactString::new(level);
        self
    }

    /// Installs the subscriber. Keep the returned guard alive for as long
    /// as logs should be flushed.
    pub async fn build(self) -> Result<WorkerGuard> {
        let mut installed = LOGGER_INSTALLED.write().await;
        if *installed {
            return Err(LoggingError::AlreadyInitialized.into());
        }

        validate_config(&self.config)?;
        setup_log_directory(&self.config.log_dir).await?;

        let rotation = match self.config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        };

        let file_appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(self.config.log_file_prefix.as_str())
            .filename_suffix("jsonl")
            .max_log_files(self.config.max_log_files)
            .build(&self.config.log_dir)
            .context("Failed to create file appender")?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let filter = EnvFilter::from_default_env().add_directive(
            Directive::from_str(&self.config.log_level).context("Invalid log level in config")?,
        );

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(non_blocking)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(json_layer)
            .try_init()
            .context("Failed to install global tracing subscriber")?;

        *installed = true;
        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &LoggerConfig) -> Result<()> {
    if config.max_log_files == 0 {
        return Err(
            LoggingError::ConfigError("Max log files must be greater than 0".to_string()).into(),
        );
    }

    if config.log_file_prefix.is_empty() {
        return Err(LoggingError::ConfigError("Empty log file prefix".to_string()).into());
    }

    validate_log_directory(&config.log_dir)?;
    Ok(())
}

fn validate_log_directory(path: &Path) -> Result<()> {
    if path.components().count() == 0 {
        return Err(LoggingError::InvalidLogDirectory("Empty path".to_string()).into());
    }

    for component in path.components() {
        if component == std::path::Component::ParentDir {
            return Err(LoggingError::InvalidLogDirectory(
                "Path traversal not allowed".to_string(),
            )
            .into());
        }
    }

    Ok(())
}

async fn setup_log_directory(log_dir: &Path) -> Result<()> {
    if !log_dir.exists() {
        TokioFs::create_dir_all(log_dir)
            .await
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(())
}

pub async fn init_logging_with_config(config: LoggerConfig) -> Result<WorkerGuard> {
    LoggerBuilder::new().with_config(config).build().await
}
