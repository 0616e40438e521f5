//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk, applying
//! environment overrides and validating the result.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given as the first CLI argument (must exist)
//! 2. Default location, if present:
//!    - **Linux/macOS:** `~/.kalshi-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.kalshi-mcp\config.json`
//!
//! Without either, built-in defaults are used.
//!
//! # Environment Overrides
//!
//! `KALSHI_BASE_URL`, `KALSHI_TIMEOUT_SECONDS`, `KALSHI_API_KEY_ID` and
//! `KALSHI_API_KEY_PATH` take precedence over the file.

mod settings;

pub use settings::{
    Config, KalshiConfig, LoggingConfig, ResourcesConfig, RetryConfig, DEFAULT_BASE_URL,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.kalshi-mcp/`
/// - **Windows:** `%USERPROFILE%\.kalshi-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".kalshi-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration, applies environment overrides and validates it.
///
/// If `path` is `None`, the default location is used when a file exists there;
/// otherwise built-in defaults apply.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - An override or a field is invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            read_config_file(p)?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => read_config_file(&p)?,
            None => Config::default(),
        },
    };

    config.apply_overrides(|name| std::env::var(name).ok())?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

fn read_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.to_path_buf(),
        source: e,
    })
}
