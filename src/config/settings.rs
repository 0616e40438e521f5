//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default Kalshi API base URL (production, v2 trade API).
pub const DEFAULT_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Upstream API settings.
    #[serde(default)]
    pub kalshi: KalshiConfig,

    /// HTTP retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Resource exposure settings.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Applies overrides from a variable lookup (the process environment in production).
    ///
    /// Empty values are ignored so that an exported-but-blank variable does not
    /// erase a value from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if `KALSHI_TIMEOUT_SECONDS` is not a positive integer.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(base_url) = get("KALSHI_BASE_URL") {
            self.kalshi.base_url = base_url;
        }
        if let Some(timeout) = get("KALSHI_TIMEOUT_SECONDS") {
            self.kalshi.timeout_seconds =
                timeout
                    .parse()
                    .map_err(|_| ConfigError::ValidationError {
                        message: format!(
                            "KALSHI_TIMEOUT_SECONDS must be a positive integer, got '{timeout}'"
                        ),
                    })?;
        }
        if let Some(key_id) = get("KALSHI_API_KEY_ID") {
            self.kalshi.api_key_id = Some(key_id);
        }
        if let Some(key_path) = get("KALSHI_API_KEY_PATH") {
            self.kalshi.api_key_path = Some(PathBuf::from(key_path));
        }
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::ValidationError { message };

        let parsed = url::Url::parse(&self.kalshi.base_url)
            .map_err(|e| invalid(format!("Invalid kalshi.base_url '{}': {e}", self.kalshi.base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "kalshi.base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if self.kalshi.timeout_seconds == 0 {
            return Err(invalid("kalshi.timeout_seconds must be greater than 0".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.http_cap_ms < self.retry.base_delay_ms
            || self.retry.network_cap_ms < self.retry.base_delay_ms
        {
            return Err(invalid(
                "retry caps must not be smaller than retry.base_delay_ms".to_string(),
            ));
        }

        Ok(())
    }
}

/// Kalshi API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KalshiConfig {
    /// API base URL, including the `/trade-api/v2` path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// API key identifier sent in the `KALSHI-ACCESS-KEY` header.
    #[serde(default)]
    pub api_key_id: Option<String>,

    /// Path to the PEM-encoded RSA private key.
    #[serde(default)]
    pub api_key_path: Option<PathBuf>,
}

impl KalshiConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for KalshiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            api_key_id: None,
            api_key_path: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_seconds() -> u64 {
    10
}

/// Retry configuration for transient upstream failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in milliseconds (doubled per attempt).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each backoff.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Backoff cap for retriable HTTP statuses.
    #[serde(default = "default_http_cap_ms")]
    pub http_cap_ms: u64,

    /// Backoff cap for connection-level failures.
    #[serde(default = "default_network_cap_ms")]
    pub network_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            http_cap_ms: default_http_cap_ms(),
            network_cap_ms: default_network_cap_ms(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    4
}

const fn default_base_delay_ms() -> u64 {
    250
}

const fn default_jitter_ms() -> u64 {
    250
}

const fn default_http_cap_ms() -> u64 {
    5_000
}

const fn default_network_cap_ms() -> u64 {
    2_000
}

/// Resource exposure configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesConfig {
    /// Whether `resources/*` methods are offered at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
