//! Configuration file parsing and structures.
//!
//! hmlocal reads a single TOML file with a logging section, the integration
//! settings shared by every config entry and the optional MQTT consumer.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use crate::engine::Platform;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub integration: IntegrationConfig,

    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"hmlocal::mqtt" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Settings applied to every config entry.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IntegrationConfig {
    /// Platforms that are not set up at all
    #[serde(default)]
    pub blocked_platforms: Vec<Platform>,
}

/// MQTT consumer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// MQTT broker hostname or IP address
    pub broker: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Topic prefix in front of `device/status/#`; empty means none
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "hmlocal".to_string()
}

impl MqttConfig {
    /// The configured prefix, unless it is empty.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|prefix| prefix.trim_matches('/'))
            .filter(|prefix| !prefix.is_empty())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// MQTT settings, if present and enabled.
    pub fn mqtt(&self) -> Option<&MqttConfig> {
        self.mqtt.as_ref().filter(|mqtt| mqtt.enabled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
