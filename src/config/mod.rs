//! # Configuration Management Module
//!
//! This module handles all configuration aspects of the smsgate daemon, providing
//! a centralized configuration system with validation, defaults, and persistence.
//!
//! ## Configuration Structure
//!
//! The configuration is organized into logical sections:
//!
//! - [`GatewayConfig`] - Polling cadence and startup behavior
//! - [`UpstreamConfig`] - The local queue server the gateway polls
//! - [`ModemConfig`] - GSM modem serial settings
//! - [`LoggingConfig`] - Logging and debugging settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use smsgate::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration from file
//!     let config = Config::load("config.toml").await?;
//!
//!     println!("Polling {} every {}ms", config.upstream.base_url, config.gateway.poll_interval_ms);
//!     println!("Modem port: {}", config.modem.port);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! smsgate uses TOML format for human-readable configuration:
//!
//! ```toml
//! [gateway]
//! poll_interval_ms = 5000
//! require_modem_at_startup = false
//!
//! [upstream]
//! base_url = "http://127.0.0.1:3000"
//! path = "/getSMS"
//! timeout_seconds = 0
//!
//! [modem]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! ```
//!
//! Configuration values follow a clear precedence order:
//! CLI args > Config file > Defaults

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub upstream: UpstreamConfig,
    pub modem: ModemConfig,
    pub logging: LoggingConfig,
}

/// Core gateway behavior: how often to poll and what to do when the modem
/// is missing at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Interval between fetch cycles in milliseconds. Values below 1000 are
    /// clamped on use to avoid hammering the queue server.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Require the modem to answer the AT probe at startup. If true and the
    /// probe fails, `start` exits with an error code. If false (default), the
    /// gateway starts with the poller inactive so `status` and log inspection
    /// still work.
    #[serde(default)]
    pub require_modem_at_startup: bool,
}

fn default_poll_interval_ms() -> u64 {
    5000
}

/// The local development server holding queued outbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the queue server, e.g. "http://127.0.0.1:3000".
    pub base_url: String,
    /// Request path appended to `base_url` for each poll.
    #[serde(default = "default_upstream_path")]
    pub path: String,
    /// Per-request timeout in seconds. 0 disables the timeout entirely,
    /// matching the historical behavior of an unbounded fetch.
    #[serde(default)]
    pub timeout_seconds: u64,
}

fn default_upstream_path() -> String {
    "/getSMS".to_string()
}

impl UpstreamConfig {
    /// Full poll URL (`base_url` with any trailing slash trimmed, plus `path`).
    pub fn poll_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    pub port: String,
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Effective poll interval with the 1000ms floor applied.
    pub fn effective_poll_interval_ms(&self) -> u64 {
        self.gateway.poll_interval_ms.max(1000)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway: GatewayConfig {
                poll_interval_ms: 5000,
                require_modem_at_startup: false,
            },
            upstream: UpstreamConfig {
                base_url: "http://127.0.0.1:3000".to_string(),
                path: "/getSMS".to_string(),
                timeout_seconds: 0,
            },
            modem: ModemConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115200,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("smsgate.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gateway.poll_interval_ms, 5000);
        assert!(!config.gateway.require_modem_at_startup);
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.upstream.path, "/getSMS");
        assert_eq!(config.upstream.timeout_seconds, 0);
        assert_eq!(config.modem.baud_rate, 115200);
    }

    #[test]
    fn test_poll_url_trims_trailing_slash() {
        let upstream = UpstreamConfig {
            base_url: "http://10.0.2.2:3000/".to_string(),
            path: "/getSMS".to_string(),
            timeout_seconds: 0,
        };
        assert_eq!(upstream.poll_url(), "http://10.0.2.2:3000/getSMS");
    }

    #[test]
    fn test_poll_interval_floor() {
        let mut config = Config::default();
        config.gateway.poll_interval_ms = 50;
        assert_eq!(config.effective_poll_interval_ms(), 1000);
        config.gateway.poll_interval_ms = 5000;
        assert_eq!(config.effective_poll_interval_ms(), 5000);
    }

    #[test]
    fn test_minimal_toml_uses_section_defaults() {
        let raw = r#"
[gateway]

[upstream]
base_url = "http://localhost:8080"

[modem]
port = "/dev/ttyACM0"
baud_rate = 9600

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.gateway.poll_interval_ms, 5000);
        assert_eq!(config.upstream.path, "/getSMS");
        assert_eq!(config.upstream.poll_url(), "http://localhost:8080/getSMS");
        assert_eq!(config.logging.file, None);
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.upstream.poll_url(), config.upstream.poll_url());
        assert_eq!(
            reparsed.gateway.poll_interval_ms,
            config.gateway.poll_interval_ms
        );
        assert_eq!(reparsed.modem.port, config.modem.port);
    }
}
