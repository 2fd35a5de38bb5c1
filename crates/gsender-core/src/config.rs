//! Configuration for gsender
//!
//! Configuration is organized into sections:
//! - Connection settings (port, baud rate, read timeout)
//! - Streaming settings (receive buffer, status polling, override pacing)
//! - Machine settings (firmware, rapid and default feed rates)
//!
//! Files are TOML or JSON, chosen by extension. A `Config` is handed to the
//! components that need it at construction time.

use crate::types::ControllerType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Order in which fine (1%) and coarse (10%) override steps are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOrderSetting {
    /// All 1% steps, then all 10% steps
    #[default]
    FineFirst,
    /// All 10% steps, then all 1% steps
    CoarseFirst,
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            timeout_ms: 50,
        }
    }
}

/// Streaming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Controller receive buffer size in bytes; `None` uses the firmware default
    pub rx_buffer_size: Option<usize>,
    /// Interval between `?` status polls in milliseconds
    pub status_poll_ms: u64,
    /// Spacing between realtime override bytes in milliseconds
    pub override_step_delay_ms: u64,
    /// Ordering of override steps
    pub override_step_order: StepOrderSetting,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            rx_buffer_size: None,
            status_poll_ms: 250,
            override_step_delay_ms: 50,
            override_step_order: StepOrderSetting::FineFirst,
        }
    }
}

/// Machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Firmware running on the controller
    pub firmware: ControllerType,
    /// Rapid (G0) rate in mm/min, used for run-time estimates
    pub rapid_rate: f64,
    /// Feed rate assumed before a program sets one, in mm/min
    pub default_feed_rate: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            firmware: ControllerType::Grbl,
            rapid_rate: 3000.0,
            default_feed_rate: 1000.0,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Streaming settings
    pub streaming: StreamingSettings,
    /// Machine settings
    pub machine: MachineSettings,
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gsender")
            .join("config.toml")
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("Failed to read config file: {}", e)))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| Error::other(format!("Invalid JSON config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::other(format!("Invalid TOML config: {}", e)))?
        } else {
            return Err(Error::other("Config file must be .json or .toml"));
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize config: {}", e)))?
        } else {
            return Err(Error::other("Config file must be .json or .toml"));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| Error::other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.baud_rate == 0 {
            return Err(Error::other("Baud rate must be > 0"));
        }
        if self.connection.timeout_ms == 0 {
            return Err(Error::other("Read timeout must be > 0"));
        }
        if self.streaming.rx_buffer_size == Some(0) {
            return Err(Error::other("Receive buffer size must be > 0"));
        }
        if self.streaming.status_poll_ms == 0 {
            return Err(Error::other("Status poll interval must be > 0"));
        }
        if self.machine.rapid_rate <= 0.0 {
            return Err(Error::other("Rapid rate must be > 0"));
        }
        if self.machine.default_feed_rate <= 0.0 {
            return Err(Error::other("Default feed rate must be > 0"));
        }
        Ok(())
    }

    /// Effective receive buffer size for the configured firmware
    pub fn rx_buffer_size(&self) -> usize {
        self.streaming
            .rx_buffer_size
            .unwrap_or_else(|| self.machine.firmware.rx_buffer_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rx_buffer_size(), 128);
    }

    #[test]
    fn test_buffer_override() {
        let mut config = Config::default();
        config.machine.firmware = ControllerType::GrblHal;
        assert_eq!(config.rx_buffer_size(), 1024);
        config.streaming.rx_buffer_size = Some(256);
        assert_eq!(config.rx_buffer_size(), 256);
    }

    #[test]
    fn test_rejects_zero_baud() {
        let mut config = Config::default();
        config.connection.baud_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[connection]\nport = \"/dev/ttyACM0\"\n")
            .expect("partial config should parse");
        assert_eq!(config.connection.port, "/dev/ttyACM0");
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.streaming.override_step_delay_ms, 50);
    }
}
