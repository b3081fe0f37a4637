//! Logging setup
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, else the configured level)
//!   └── Fmt Layer (pretty or json, on stderr)
//! ```
//!
//! Stdout is left to the per-item summary printed by the CLI.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("unknown log format '{0}'")]
    UnknownFormat(String),

    #[error("failed to set global subscriber (may already be initialized): {0}")]
    AlreadyInitialized(String),
}

/// Build the filter: `RUST_LOG` when set, else `override_level`, else the
/// configured level.
pub fn env_filter(
    config: &LoggingConfig,
    override_level: Option<&str>,
) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = override_level.unwrap_or(&config.level);
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig, override_level: Option<&str>) -> Result<(), LoggingError> {
    let filter = env_filter(config, override_level)?;

    let result = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "pretty" => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        other => return Err(LoggingError::UnknownFormat(other.to_string())),
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
