#![deny(unsafe_code)]

//! Configuration loading and validation for bramble.
//!
//! Loads TOML configuration files and validates them against expected
//! schemas. Provides the [`AppConfig`] type as the central configuration
//! structure shared by the daemon and the client.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Master daemon configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Client-side configuration.
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the master daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path of the Unix socket the master binds for client transactions.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

fn default_socket_path() -> String {
    "/tmp/bramble.sock".to_string()
}

/// Configuration for one-shot clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Decimal places kept when generating random insert-many payloads.
    #[serde(default = "default_precision")]
    pub precision: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
        }
    }
}

fn default_precision() -> u32 {
    2
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
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
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.socket_path.is_empty() {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty".to_string(),
            ));
        }
        if self.client.precision > 7 {
            // f32 carries ~7 significant decimal digits; more is noise.
            return Err(ConfigError::Validation(format!(
                "client.precision {} exceeds f32 precision (max 7)",
                self.client.precision
            )));
        }
        Ok(())
    }
}
