//! Configuration management.

use anyhow::{Context, Result};
use ipmi_exporter_core::collector::DEFAULT_BINARY;
use ipmi_exporter_core::{RawSensorSpec, SensorRegistry};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub web: WebConfig,

    /// ipmitool invocation
    #[serde(default)]
    pub ipmi: IpmiConfig,

    /// Raw sensor table; the built-in Supermicro PSU queries when absent
    #[serde(default)]
    pub raw_sensors: Option<Vec<RawSensorConfig>>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Listen address (e.g., "0.0.0.0:9289")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path under which metrics are exposed
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// ipmitool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IpmiConfig {
    /// Path to the ipmitool binary, optionally followed by arguments
    #[serde(default = "default_binary")]
    pub path: String,

    /// Milliseconds each ipmitool call may run; zero or negative means no limit
    #[serde(default = "default_timeout")]
    pub timeout: i64,
}

impl Default for IpmiConfig {
    fn default() -> Self {
        Self {
            path: default_binary(),
            timeout: default_timeout(),
        }
    }
}

/// One raw sensor query.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSensorConfig {
    /// Label value of the exported reading
    pub name: String,

    /// Arguments appended to ipmitool (e.g., "raw 0x06 0x52 0x07 0x78 0x01 0x97")
    pub command: String,

    /// Unit of the decoded value
    #[serde(default = "default_raw_unit")]
    pub unit: String,
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:9289".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_timeout() -> i64 {
    -1 // No limit
}

fn default_raw_unit() -> String {
    "W".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.normalize();
        Ok(config)
    }

    /// Makes the metrics path a valid route.
    pub fn normalize(&mut self) {
        if !self.web.path.starts_with('/') {
            self.web.path = format!("/{}", self.web.path);
        }
    }

    /// Returns the per-command timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.ipmi.timeout)
            .ok()
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Builds the raw sensor table.
    pub fn registry(&self) -> SensorRegistry {
        match &self.raw_sensors {
            Some(sensors) => SensorRegistry::new(
                sensors
                    .iter()
                    .map(|s| RawSensorSpec::new(&s.name, &s.command, &s.unit))
                    .collect(),
            ),
            None => SensorRegistry::default(),
        }
    }
}
