//! Logging configuration and initialization
//!
//! Centralized tracing setup for all movies-etl binaries. Supports console
//! and/or daily-rotated file output, text or JSON formats, and per-module
//! filter directives, all configurable from the environment.
//!
//! Use the structured logging macros (`trace!`, `debug!`, `info!`, `warn!`,
//! `error!`) everywhere; `println!` output bypasses the subscriber and is
//! invisible in JSON mode.
//!
//! # Example
//!
//! ```no_run
//! use movies_common::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap();
//! init_logging(&config).unwrap();
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Minimum level of messages to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Output target (console, file, or both)
    pub output: LogOutput,

    /// Line format (text or JSON)
    pub format: LogFormat,

    /// Directory for log files (only used when output includes file)
    pub log_dir: PathBuf,

    /// Log file prefix, e.g. "movies-etl" -> "movies-etl.2026-08-30.log"
    pub log_file_prefix: String,

    /// Extra filter directives, e.g. "sqlx=warn,reqwest=info"
    pub filter_directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "movies-etl".to_string(),
            filter_directives: None,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`: directory for log files
    /// - `LOG_FILE_PREFIX`: prefix for log files
    /// - `LOG_FILTER`: extra filter directives
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            config.log_file_prefix = prefix;
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        Ok(config)
    }

    /// Override the filter directives, keeping everything else
    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter_directives = Some(directives.into());
        self
    }

    /// Override the log file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize the global tracing subscriber
///
/// Must be called exactly once at startup, before any log macro fires.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',') {
            filter = filter.add_directive(
                directive
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid filter directive: {}", directive))?,
            );
        }
    }

    let mut layers: Vec<BoxedLayer> = vec![filter.boxed()];

    if matches!(config.output, LogOutput::Console | LogOutput::Both) {
        let layer = fmt::layer().with_writer(std::io::stdout);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        // The guard must outlive the process for buffered lines to flush.
        std::mem::forget(guard);

        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    Ok(())
}
