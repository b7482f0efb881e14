//! Structured logging setup.
//!
//! - JSON formatting for production
//! - Pretty formatting for development
//! - Output to stdout, stderr or a daily-rolled file
//! - Per-operation and per-fan-out spans

use crate::model::{EntityKind, Id};
use anyhow::{Context, Result};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for logging setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for log files (when output is `File`)
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    pub service_name: String,
    pub service_version: String,
    /// e.g. "development", "production"
    pub environment: String,
    pub enable_rotation: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging (production)
    Json,
    /// Human-readable output (development)
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());

        Self {
            format: if is_production(&environment) {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "dictionary-service".to_string(),
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment,
            enable_rotation: true,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(format) = env::var("LOG_FORMAT") {
            config.format = parse_format(&format).unwrap_or(config.format);
        }

        if let Ok(output) = env::var("LOG_OUTPUT") {
            config.output = parse_output(&output).unwrap_or(config.output);
        }

        if let Ok(log_dir) = env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        if let Ok(rotation) = env::var("LOG_ROTATION") {
            config.enable_rotation = !matches!(rotation.to_lowercase().as_str(), "0" | "false" | "off");
        }

        config
    }

    fn default_filter(&self) -> EnvFilter {
        let level = if is_production(&self.environment) {
            "info"
        } else {
            "debug"
        };
        EnvFilter::new(format!("{level},hyper=info,tower=info"))
    }
}

fn is_production(environment: &str) -> bool {
    environment == "production" || environment == "prod"
}

fn parse_format(value: &str) -> Option<LogFormat> {
    match value.to_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_output(value: &str) -> Option<LogOutput> {
    match value.to_lowercase().as_str() {
        "stdout" => Some(LogOutput::Stdout),
        "stderr" => Some(LogOutput::Stderr),
        "file" => Some(LogOutput::File),
        _ => None,
    }
}

/// Initialize structured logging with the given configuration.
///
/// Returns a WorkerGuard that must be held for the lifetime of the application
/// to ensure all logs are flushed.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.default_filter());

    let (writer, guard) = match config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

            let file_appender = if config.enable_rotation {
                tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix)
            } else {
                tracing_appender::rolling::never(&config.log_dir, &config.log_file_prefix)
            };
            tracing_appender::non_blocking(file_appender)
        }
    };

    let registry = tracing_subscriber::registry();

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_level(true)
                .with_line_number(true)
                .with_file(true)
                .with_thread_ids(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_filter(env_filter);
            registry
                .with(fmt_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_target(true)
                .with_level(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(config.output != LogOutput::File)
                .with_filter(env_filter);
            registry
                .with(fmt_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        format = ?config.format,
        output = ?config.output,
        "logging initialized"
    );

    Ok(guard)
}

/// Span wrapping one core dictionary operation.
pub fn operation_span(name: &'static str) -> tracing::Span {
    tracing::info_span!(
        "operation",
        operation.name = name,
        service = env!("CARGO_PKG_NAME"),
    )
}

/// Span wrapping one fan-out call; child lookups nest under it.
pub fn fanout_span(entity: EntityKind, parent_id: Id) -> tracing::Span {
    tracing::debug_span!(
        "fanout",
        fanout.entity = %entity,
        fanout.parent_id = parent_id,
    )
}
