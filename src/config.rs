//! Configuration module for pvreport.
//!
//! Loads configuration from a JSON file; the file path comes from the
//! `PVREPORT_CONFIG` environment variable with a sensible default.

use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;

/// Default config file path when `PVREPORT_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "pvreport.json";

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One inverter polling endpoint, immutable for the run.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceTarget {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_device_path")]
    pub path: String,
}

impl DeviceTarget {
    /// Full URL of the device status page.
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

fn default_port() -> u16 {
    80
}

fn default_device_path() -> String {
    "/status.html".to_string()
}

/// Retry/timeout/delay tunables for the device polling loop.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per device (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in seconds, doubled per failed attempt (default: 5)
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    /// Pause between devices in seconds (default: 5)
    #[serde(default = "default_device_delay_secs")]
    pub device_delay_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            device_delay_secs: default_device_delay_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    5
}

fn default_device_delay_secs() -> u64 {
    5
}

/// Reporting endpoint credentials and URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    pub system_id: u64,
    /// Submission timeout in seconds (default: 15)
    #[serde(default = "default_submit_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://pvoutput.org/service/r2/addstatus.jsp".to_string()
}

fn default_submit_timeout_secs() -> u64 {
    15
}

/// Optional enrichment collaborator (weather station or voltage meter).
#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorConfig {
    pub url: String,
    /// Fetch timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub devices: Vec<DeviceTarget>,
    #[serde(default)]
    pub polling: PollingConfig,
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub weather: Option<CollaboratorConfig>,
    #[serde(default)]
    pub voltage: Option<CollaboratorConfig>,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

fn default_history_path() -> String {
    "pvreport-history.json".to_string()
}

impl Config {
    /// Load configuration from the file named by `PVREPORT_CONFIG`,
    /// falling back to `pvreport.json` in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("PVREPORT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(&path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("no devices configured".to_string()));
        }
        for (i, d) in self.devices.iter().enumerate() {
            if d.host.is_empty() {
                return Err(ConfigError::Invalid(format!("device {} has empty host", i)));
            }
        }
        if self.reporting.api_key.is_empty() {
            return Err(ConfigError::Invalid("reporting.api_key is empty".to_string()));
        }
        if self.polling.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "polling.max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "devices": [
            {"host": "192.168.1.40", "username": "admin", "password": "admin"}
        ],
        "reporting": {"api_key": "abc123", "system_id": 12345}
    }"#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = Config::load_from_str(MINIMAL).unwrap();
        assert_eq!(cfg.devices.len(), 1);
        assert_eq!(cfg.devices[0].port, 80);
        assert_eq!(cfg.devices[0].path, "/status.html");
        assert_eq!(cfg.devices[0].url(), "http://192.168.1.40:80/status.html");
        assert_eq!(cfg.polling.max_retries, 3);
        assert_eq!(cfg.polling.retry_base_delay_secs, 5);
        assert_eq!(cfg.polling.device_delay_secs, 5);
        assert_eq!(cfg.reporting.endpoint, default_endpoint());
        assert_eq!(cfg.history_path, "pvreport-history.json");
        assert!(cfg.weather.is_none());
        assert!(cfg.voltage.is_none());
    }

    #[test]
    fn test_empty_devices_rejected() {
        let s = r#"{"devices": [], "reporting": {"api_key": "k", "system_id": 1}}"#;
        assert!(Config::load_from_str(s).is_err());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let s = r#"{
            "devices": [{"host": "h", "username": "u", "password": "p"}],
            "reporting": {"api_key": "", "system_id": 1}
        }"#;
        assert!(Config::load_from_str(s).is_err());
    }
}
