//! # Configuration Management
//!
//! Centralized configuration for the SSP host engine.
//!
//! Settings are grouped by concern: the serial port, the framing session
//! (address, timeouts, retries, encryption), the device workflow (polling,
//! reconnects, protocol version, unit type) and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`

use crate::error::{Result, SspError};
use crate::protocol::codes::{MIN_PROTOCOL_VERSION, PROTOCOL_PROBE_LIMIT};
use crate::service::device::UnitType;
use crate::transport::SerialSettings;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Highest address an SSP device can have (7 bits)
pub const MAX_ADDRESS: u8 = 0x7F;

/// Default number of transmissions per exchange
pub const DEFAULT_RETRY_BUDGET: u8 = 3;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SspConfig {
    /// Serial port settings
    #[serde(default)]
    pub port: SerialSettings,

    /// Framing session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Device workflow configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SspConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| SspError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| SspError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| SspError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("SSP_PORT") {
            config.port.name = port;
        }

        if let Ok(address) = std::env::var("SSP_ADDRESS") {
            config.session.address = address.parse::<u8>().map_err(|e| {
                SspError::ConfigError(format!("Invalid SSP_ADDRESS '{address}': {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("SSP_RESPONSE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.session.response_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(interval) = std::env::var("SSP_POLL_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.device.poll_interval = Duration::from_millis(val);
            }
        }

        if let Ok(budget) = std::env::var("SSP_RETRY_BUDGET") {
            if let Ok(val) = budget.parse::<u8>() {
                config.session.retry_budget = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        let example = Self::default_with_overrides(|c| c.port.name = "/dev/ttyUSB0".to_string());
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SspError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| SspError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port.name.is_empty() {
            errors.push("Port name cannot be empty".to_string());
        }
        if self.port.baud_rate == 0 {
            errors.push("Baud rate must be greater than 0".to_string());
        }

        errors.extend(self.session.validate());
        errors.extend(self.device.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SspError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Framing session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Device address (7 bits)
    pub address: u8,

    /// Time to wait for a reply to one transmission
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Total transmissions per exchange before a timeout is reported
    pub retry_budget: u8,

    /// Re-send once after an encrypted reply fails verification
    pub crc_retry: bool,

    /// Negotiate a key and encrypt commands after connecting
    pub encryption: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: 0,
            response_timeout: timeout::DEFAULT_RESPONSE_TIMEOUT,
            retry_budget: DEFAULT_RETRY_BUDGET,
            crc_retry: true,
            encryption: true,
        }
    }
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address > MAX_ADDRESS {
            errors.push(format!(
                "Device address {:#04x} out of range (maximum: {MAX_ADDRESS:#04x})",
                self.address
            ));
        }

        if self.response_timeout.as_millis() < 10 {
            errors.push("Response timeout too short (minimum: 10ms)".to_string());
        } else if self.response_timeout.as_secs() > 60 {
            errors.push("Response timeout too long (maximum: 60s)".to_string());
        }

        if self.retry_budget == 0 {
            errors.push("Retry budget must be at least 1".to_string());
        }

        if !self.encryption {
            errors.push(
                "WARNING: Encryption is disabled - payout commands will be refused by the device"
                    .to_string(),
            );
        }

        errors
    }
}

/// Bezel LED colour sent after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BezelColour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Default for BezelColour {
    fn default() -> Self {
        Self {
            red: 0,
            green: 0,
            blue: 255,
        }
    }
}

/// Device workflow configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Period of the poll loop
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Connection attempts made by `start()`
    pub reconnect_attempts: u32,

    /// Pause between connection attempts
    #[serde(with = "duration_serde")]
    pub reconnect_interval: Duration,

    /// Lowest protocol version accepted from the device
    pub min_protocol_version: u8,

    /// Probing stops here and falls back to the minimum
    pub protocol_probe_limit: u8,

    /// Unit type the host is written for
    pub expected_unit: UnitType,

    /// Polls answered with HOLD while a note sits in escrow (0 disables)
    pub hold_polls: u32,

    /// Bezel colour
    pub bezel: BezelColour,

    /// Channel inhibit mask (bit set = channel enabled)
    pub inhibit_mask: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            poll_interval: timeout::POLL_INTERVAL,
            reconnect_attempts: 5,
            reconnect_interval: timeout::RECONNECT_INTERVAL,
            min_protocol_version: MIN_PROTOCOL_VERSION,
            protocol_probe_limit: PROTOCOL_PROBE_LIMIT,
            expected_unit: UnitType::SmartPayout,
            hold_polls: 0,
            bezel: BezelColour::default(),
            inhibit_mask: 0xFFFF,
        }
    }
}

impl DeviceConfig {
    /// Validate device configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.poll_interval.as_millis() < 50 {
            errors.push("Poll interval too short (minimum: 50ms)".to_string());
        } else if self.poll_interval.as_secs() > 5 {
            errors.push("Poll interval too long (maximum: 5s); the device resets its watchdog".to_string());
        }

        if self.reconnect_attempts == 0 {
            errors.push("Reconnect attempts must be greater than 0".to_string());
        }

        if self.reconnect_interval.as_secs() > 60 {
            errors.push("Reconnect interval too long (maximum: 60s)".to_string());
        }

        if self.min_protocol_version < MIN_PROTOCOL_VERSION {
            errors.push(format!(
                "Minimum protocol version {} below supported floor {MIN_PROTOCOL_VERSION}",
                self.min_protocol_version
            ));
        }

        if self.protocol_probe_limit < self.min_protocol_version {
            errors.push(format!(
                "Protocol probe limit {} below minimum version {}",
                self.protocol_probe_limit, self.min_protocol_version
            ));
        }

        if self.inhibit_mask == 0 {
            errors.push("WARNING: Every channel is inhibited - no notes will be accepted".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("ssp-host"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
