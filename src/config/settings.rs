//! Client settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation service address and routes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_single_path")]
    pub single_path: String,
    #[serde(default = "default_batch_path")]
    pub batch_path: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_single_path() -> String {
    "/generate".to_string()
}

fn default_batch_path() -> String {
    "/generate_batch".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            single_path: default_single_path(),
            batch_path: default_batch_path(),
        }
    }
}

/// Where downloaded archives land
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Replace an existing file instead of picking a numbered name
    #[serde(default)]
    pub overwrite: bool,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            overwrite: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = path.to_str().ok_or_else(|| {
            ConfigError::Message(format!(
                "Config path {} is not valid UTF-8",
                path.display()
            ))
        })?;

        let config = Config::builder()
            // Start with default values
            .set_default("service.base_url", default_base_url())?
            .set_default("service.single_path", default_single_path())?
            .set_default("service.batch_path", default_batch_path())?
            .set_default("output.download_dir", ".")?
            .set_default("output.overwrite", false)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            // Load from configuration file
            .add_source(File::with_name(file).required(false))
            // Override with environment variables (prefixed with EDGEFORGE_)
            .add_source(
                Environment::with_prefix("EDGEFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.service.base_url).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Invalid service base_url '{}': {}",
                self.service.base_url, e
            )))
        })?;

        for (name, path) in [
            ("single_path", &self.service.single_path),
            ("batch_path", &self.service.batch_path),
        ] {
            if !path.starts_with('/') {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Service {} '{}' must start with '/'",
                    name, path
                ))));
            }
        }

        if self.service.single_path == self.service.batch_path {
            return Err(AppError::Config(config::ConfigError::Message(
                "Single and batch endpoints must differ".to_string(),
            )));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Invalid log format '{}'. Must be 'json' or 'pretty'",
                self.logging.format
            ))));
        }

        Ok(())
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Internal(e.to_string()))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
