//! Configuration management for goe-bridge
//!
//! This module handles loading, validation, and management of the charger
//! configuration from YAML files.

use crate::adapter::{DEFAULT_REQUEST_TIMEOUT, ProtocolVersion};
use crate::error::{GoeError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Shortest poll interval a charger may be configured with
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll interval used when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "GOE_BRIDGE_CONFIG";

fn default_protocol() -> String {
    "1".to_string()
}

fn default_correction_factor() -> f64 {
    1.0
}

fn default_poll_interval_seconds() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chargers to poll, one entry per physical device
    #[serde(default)]
    pub chargers: Vec<ChargerConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity and connection facts for one physical charger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerConfig {
    /// Unique device name, used as the lookup key everywhere
    pub name: String,

    /// Network address of the charger's local HTTP API
    pub host: String,

    /// Vendor API version tag ("1" or "2"). Entries written before the
    /// field existed are V1 chargers.
    #[serde(
        default = "default_protocol",
        alias = "api_level",
        deserialize_with = "string_or_number"
    )]
    pub protocol: String,

    /// Factor applied to the derived "corrected" energy fields
    #[serde(
        default = "default_correction_factor",
        deserialize_with = "number_or_numeric_string"
    )]
    pub correction_factor: f64,

    /// Poll interval in seconds (floored at 10)
    #[serde(default = "default_poll_interval_seconds", alias = "scan_interval")]
    pub poll_interval_seconds: u64,

    /// Seconds a status request may take before it fails with a timeout
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level; falls back to `level`
    pub console_level: Option<String>,

    /// Optional file-specific level; falls back to `level`
    pub file_level: Option<String>,

    /// Path to log file (its parent directory receives the rolled files)
    pub file: String,

    /// Number of rolled files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/goe-bridge.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl ChargerConfig {
    /// Create a charger entry with default protocol, factor and interval
    pub fn new<N: Into<String>, H: Into<String>>(name: N, host: H) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            protocol: default_protocol(),
            correction_factor: default_correction_factor(),
            poll_interval_seconds: default_poll_interval_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    pub fn with_protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_correction_factor(mut self, factor: f64) -> Self {
        self.correction_factor = factor;
        self
    }

    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval_seconds = seconds;
        self
    }

    /// Parsed protocol version
    pub fn protocol_version(&self) -> Result<ProtocolVersion> {
        self.protocol.parse()
    }

    /// Effective poll interval, clamped up to [`MIN_POLL_INTERVAL`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds).max(MIN_POLL_INTERVAL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Correction factor, or 1.0 when the configured one is unusable
    pub fn effective_correction_factor(&self) -> f64 {
        if self.correction_factor.is_finite() && self.correction_factor > 0.0 {
            self.correction_factor
        } else {
            1.0
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Load configuration from `GOE_BRIDGE_CONFIG` or the default locations
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.trim().is_empty()
        {
            return Self::from_file(path.trim());
        }

        let default_paths = [
            "goe_bridge.yaml",
            "/data/goe_bridge.yaml",
            "/etc/goe-bridge/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Look up a charger entry by name
    pub fn charger(&self, name: &str) -> Option<&ChargerConfig> {
        self.chargers.iter().find(|c| c.name == name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for (idx, charger) in self.chargers.iter().enumerate() {
            if charger.name.trim().is_empty() {
                return Err(GoeError::validation(
                    format!("chargers[{}].name", idx),
                    "Name cannot be empty".to_string(),
                ));
            }

            if !seen.insert(charger.name.as_str()) {
                return Err(GoeError::validation(
                    format!("chargers[{}].name", idx),
                    format!("Duplicate charger name '{}'", charger.name),
                ));
            }

            if charger.host.trim().is_empty() {
                return Err(GoeError::validation(
                    format!("chargers[{}].host", idx),
                    "Host cannot be empty".to_string(),
                ));
            }

            charger.protocol_version()?;

            if charger.request_timeout_seconds == 0 {
                return Err(GoeError::validation(
                    format!("chargers[{}].request_timeout_seconds", idx),
                    "Must be at least 1".to_string(),
                ));
            }

            if !(charger.correction_factor.is_finite() && charger.correction_factor > 0.0) {
                return Err(GoeError::validation(
                    format!("chargers[{}].correction_factor", idx),
                    "Must be positive".to_string(),
                ));
            }
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        Ok(())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {:?}",
            other
        ))),
    }
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        serde_yaml::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number '{}': {}", s, e))),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {:?}",
            other
        ))),
    }
}
