//! Configuration module for Photo Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every section has defaults,
//! so an empty document (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Largest batch the batch-create call accepts.
pub const MAX_BATCH_SIZE: usize = 50;

/// Largest page the album listing call accepts.
pub const MAX_ALBUM_PAGE_SIZE: u32 = 50;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// assert_eq!(expand_env_vars("prefix-${MY_VAR}"), "prefix-value");
/// assert_eq!(expand_env_vars("${MISSING:-default}"), "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var pattern is valid");
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // Keep the placeholder so validation can report it.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

fn deserialize_optional_with_env<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| expand_env_vars(&s))
        .filter(|s| !s.is_empty() && !s.starts_with("${")))
}

fn is_valid_http_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && reqwest::Url::parse(url).is_ok()
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.api.endpoint) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid API endpoint '{}': must be an http:// or https:// URL",
                self.api.endpoint
            )));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_seconds must be greater than 0".into(),
            ));
        }

        let pipeline = &self.pipeline;
        if pipeline.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.concurrency must be at least 1".into(),
            ));
        }

        if pipeline.batch_size == 0 || pipeline.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "Invalid batch size {}: must be between 1 and {}",
                pipeline.batch_size, MAX_BATCH_SIZE
            )));
        }

        if pipeline.album_page_size == 0 || pipeline.album_page_size > MAX_ALBUM_PAGE_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "Invalid album page size {}: must be between 1 and {}",
                pipeline.album_page_size, MAX_ALBUM_PAGE_SIZE
            )));
        }

        let retry = &pipeline.retry;
        if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid backoff multiplier {}: must be at least 1.0",
                retry.backoff_multiplier
            )));
        }

        if retry.max_backoff_ms < retry.initial_backoff_ms {
            return Err(ConfigError::ValidationError(
                "retry.max_backoff_ms must not be smaller than retry.initial_backoff_ms".into(),
            ));
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format '{}': must be 'pretty' or 'json'",
                    other
                )))
            }
        }

        Ok(())
    }
}

/// Photos service API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the photo-library service. Supports ${VAR} expansion.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token attached to every API call. Supports ${VAR} expansion;
    /// an unresolved placeholder counts as unset.
    #[serde(default, deserialize_with = "deserialize_optional_with_env")]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds. Default: 300
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_endpoint() -> String {
    "https://photoslibrary.googleapis.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

/// Upload pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of uploads in flight at once. Default: 4
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Items per batch-create call. Default: 20
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Albums fetched per listing page. Default: 50
    #[serde(default = "default_album_page_size")]
    pub album_page_size: u32,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            album_page_size: default_album_page_size(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_batch_size() -> usize {
    20
}

fn default_album_page_size() -> u32 {
    50
}

/// Retry configuration for transient failures (429 and 5xx, network errors).
///
/// # Example
///
/// ```yaml
/// retry:
///   max_retries: 5
///   initial_backoff_ms: 3000
///   max_backoff_ms: 60000
///   backoff_multiplier: 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt. Default: 5
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry. Default: 3000
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay. Default: 60000
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth factor between consecutive delays. Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Optional overall time budget for one retried call.
    #[serde(default)]
    pub deadline_seconds: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            deadline_seconds: None,
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    3000
}

fn default_max_backoff_ms() -> u64 {
    60000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set. Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "pretty" or "json". Default: "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Write metrics in Prometheus text format to this file after a run.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.concurrency, 4);
        assert_eq!(config.pipeline.batch_size, 20);
        assert_eq!(config.pipeline.retry.max_retries, 5);
        assert_eq!(config.pipeline.retry.initial_backoff_ms, 3000);
    }

    #[test]
    fn test_config_validation_batch_size_over_limit() {
        let mut config = Config::default();
        config.pipeline.batch_size = MAX_BATCH_SIZE + 1;
        assert!(config.validate().is_err());

        config.pipeline.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_concurrency() {
        let mut config = Config::default();
        config.pipeline.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_endpoint_scheme() {
        let mut config = Config::default();
        config.api.endpoint = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_endpoint_host() {
        let mut config = Config::default();
        config.api.endpoint = "http://bad host".into();
        assert!(config.validate().is_err());

        config.api.endpoint = "http://localhost:8080/".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_multiplier() {
        let mut config = Config::default();
        config.pipeline.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        assert_eq!(
            expand_env_vars("${PHOTO_UPLOADR_SURELY_UNSET:-fallback}"),
            "fallback"
        );
        assert_eq!(
            expand_env_vars("${PHOTO_UPLOADR_SURELY_UNSET}"),
            "${PHOTO_UPLOADR_SURELY_UNSET}"
        );
    }

    #[test]
    fn test_unresolved_access_token_is_unset() {
        let config: Config =
            serde_yaml::from_str("api:\n  access_token: \"${PHOTO_UPLOADR_SURELY_UNSET}\"\n")
                .unwrap();
        assert!(config.api.access_token.is_none());
    }
}
