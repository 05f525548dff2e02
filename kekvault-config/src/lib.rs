//! Configuration management for KEK vault services

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix shared by every environment variable read by [`KekConfig`]
pub const ENV_PREFIX: &str = "KEK";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which key encryptor backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncryptorMode {
    /// Versioned, rotating key store in a local folder
    #[default]
    Folder,
    /// Single unprotected master key, for developer machines only
    Developer,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (for production)
    Json,
    /// Human-readable output
    #[default]
    Console,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KekConfig {
    /// Folder holding key metadata and per-generation key files
    pub folder: PathBuf,
    /// Passphrase protecting key files at rest
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub mode: EncryptorMode,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl KekConfig {
    /// Load configuration from `KEK_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();
        Self::build(None)
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(Some(vars))
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).source(vars))
            .build()?;

        let config: KekConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("KEK_FOLDER must not be empty".to_string()));
        }
        Ok(())
    }

    /// Passphrase for at-rest protection; an empty value means none
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref().filter(|p| !p.is_empty())
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}
