//! # Configuration Management
//!
//! Centralized configuration for the quote server and client.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults, or `default_with_overrides()`
//!
//! ## Security Considerations
//! - `pow_timeout` bounds the whole per-connection exchange; a slow client
//!   cannot extend it
//! - Difficulty grows the expected client cost by 16x per step; values above
//!   8 make the handshake impractically slow for ordinary clients

use crate::error::{ProtocolError, Result};
use crate::protocol::pow::MAX_DIFFICULTY;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default required number of leading zero hex digits
pub const DEFAULT_POW_DIFFICULTY: u8 = 6;

/// Default address for both the listener and the client target
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from a key lookup (the process environment in `from_env`).
    ///
    /// `SERVER_ADDR` sets both the listen and the target address; the
    /// `POW_GATEWAY_*` variables take precedence over it.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("SERVER_ADDR") {
            self.server.address = addr.clone();
            self.client.address = addr;
        }

        if let Some(addr) = lookup("POW_GATEWAY_SERVER_ADDRESS") {
            self.server.address = addr;
        }

        if let Some(addr) = lookup("POW_GATEWAY_CLIENT_ADDRESS") {
            self.client.address = addr;
        }

        if let Some(val) = lookup("POW_GATEWAY_POW_TIMEOUT_MS") {
            self.server.pow_timeout =
                Duration::from_millis(parse_env("POW_GATEWAY_POW_TIMEOUT_MS", &val)?);
        }

        if let Some(val) = lookup("POW_GATEWAY_POW_DIFFICULTY") {
            self.server.pow_difficulty = parse_env("POW_GATEWAY_POW_DIFFICULTY", &val)?;
        }

        if let Some(path) = lookup("POW_GATEWAY_QUOTES_FILE") {
            self.server.quotes_file = Some(PathBuf::from(path));
        }

        if let Some(val) = lookup("POW_GATEWAY_HANDSHAKE_TIMEOUT_MS") {
            self.client.handshake_timeout =
                Duration::from_millis(parse_env("POW_GATEWAY_HANDSHAKE_TIMEOUT_MS", &val)?);
        }

        if let Some(level) = lookup("POW_GATEWAY_LOG_LEVEL") {
            self.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid POW_GATEWAY_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(())
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
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

fn into_result(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {key}: '{value}'")))
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:8080")
    pub address: String,

    /// Per-connection budget covering the challenge, the response, and the reply.
    /// Also the longest shutdown waits for in-flight connections.
    #[serde(with = "duration_serde")]
    pub pow_timeout: Duration,

    /// Required number of leading zero hex digits in the solution hash
    pub pow_difficulty: u8,

    /// Quote corpus, one quote per line; the built-in corpus when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotes_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_ADDRESS),
            pow_timeout: timeout::DEFAULT_POW_TIMEOUT,
            pow_difficulty: DEFAULT_POW_DIFFICULTY,
            quotes_file: None,
        }
    }
}

impl ServerConfig {
    /// Validate only this section, as a Result
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8080')",
                self.address
            ));
        }

        if self.pow_timeout.as_millis() < 100 {
            errors.push("PoW timeout too short (minimum: 100ms)".to_string());
        } else if self.pow_timeout.as_secs() > 300 {
            errors.push("PoW timeout too long (maximum: 300s)".to_string());
        }

        if self.pow_difficulty > MAX_DIFFICULTY {
            errors.push(format!(
                "PoW difficulty {} can never be met (maximum: {MAX_DIFFICULTY})",
                self.pow_difficulty
            ));
        }

        if let Some(ref path) = self.quotes_file {
            if !path.exists() {
                errors.push(format!("Quotes file does not exist: {}", path.display()));
            }
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target server address
    pub address: String,

    /// Timeout for the TCP connect
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Budget for the whole exchange after connecting, solving included
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_ADDRESS),
            connection_timeout: timeout::DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: timeout::DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Validate only this section, as a Result
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Host names are resolved at connect time, so only require host:port
        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if !self.address.contains(':') {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'example.com:8080')",
                self.address
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
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
            app_name: String::from("pow-gateway"),
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
        level.as_str().to_ascii_lowercase().serialize(serializer)
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
