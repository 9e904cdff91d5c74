//! Tracing setup shared by the xapp binaries.
//!
//! One call to [`init_tracing`] installs a `tracing-subscriber` registry with:
//! - an `EnvFilter` (`RUST_LOG` wins over the configured default)
//! - a stderr layer, compact text or JSON lines
//! - optionally a daily-rolling JSON file layer via `tracing-appender`
//!
//! Keep the returned [`TracingGuard`] alive for the life of the process, or
//! buffered file output is lost on exit.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "warn,xapp_server=info,xapp_core=info,tower_http=info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "compact" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ObservabilityError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Unknown log format '{0}' (expected 'text' or 'json')")]
    UnknownFormat(String),

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is not set.
    pub default_directives: String,
    /// Directory for rolling JSON log files; `None` disables file output.
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            default_directives: DEFAULT_DIRECTIVES.to_string(),
            log_dir: None,
            file_prefix: "xapp-server.log".to_string(),
        }
    }
}

/// Flushes the file writer on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    _file: Option<WorkerGuard>,
}

/// Resolve the filter: `RUST_LOG` if set and valid, else the configured default.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, ObservabilityError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.default_directives)
            .map_err(|e| ObservabilityError::Filter(e.to_string())),
    }
}

pub fn init_tracing(config: &LogConfig) -> Result<TracingGuard, ObservabilityError> {
    let filter = build_filter(config)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match config.format {
        LogFormat::Text => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
    });

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ObservabilityError::Init(e.to_string()))?;

    Ok(TracingGuard { _file: file_guard })
}
