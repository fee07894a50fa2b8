//! # Configuration Management
//!
//! Centralized configuration for the server and client roles.
//!
//! This module provides structured configuration for listening, storage layout,
//! snapshot transfer, account access rules, the world-object feature and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`

use crate::core::serialization::SerializationFormat;
use crate::error::{ProtocolError, Result};
use crate::utils::compression::CompressionKind;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Current supported protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic bytes to identify protocol packets ("WSES")
pub const MAGIC_BYTES: [u8; 4] = [0x57, 0x53, 0x45, 0x53];

/// Max allowed packet body size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Max allowed length of a packet type name in bytes
pub const MAX_TYPE_NAME_LEN: usize = 128;

/// Default size of one snapshot transfer part (1 MiB)
pub const DEFAULT_PART_SIZE: usize = 1024 * 1024;

/// Room kept free inside a packet body for the transfer envelope around a part
pub const PART_ENVELOPE_RESERVE: usize = 64 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// On-disk layout of persisted records
    #[serde(default)]
    pub storage: StorageConfig,

    /// Snapshot transfer configuration
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Account handshake rules
    #[serde(default)]
    pub access: AccessConfig,

    /// World-object feature configuration
    #[serde(default)]
    pub world: WorldConfig,

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

        if let Ok(addr) = std::env::var("WORLD_SESSION_SERVER_ADDRESS") {
            config.server.address = addr.clone();
            config.client.address = addr;
        }

        if let Ok(root) = std::env::var("WORLD_SESSION_STORAGE_ROOT") {
            config.storage.root = PathBuf::from(root);
        }

        if let Ok(timeout) = std::env::var("WORLD_SESSION_IDLE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(size) = std::env::var("WORLD_SESSION_PART_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.transfer.part_size_bytes = val;
            }
        }

        if let Ok(version) = std::env::var("WORLD_SESSION_SERVER_VERSION") {
            config.access.server_version = version;
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
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.transfer.validate());
        errors.extend(self.access.validate());
        errors.extend(self.world.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listen address (e.g., "0.0.0.0:25555")
    pub address: String,

    /// How long a connection may stay silent before it is dropped
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:25555"),
            idle_timeout: timeout::IDLE_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_connections: 256,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:25555')",
                self.address
            ));
        }

        if self.idle_timeout.as_secs() < 1 {
            errors.push("Idle timeout too short (minimum: 1s)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
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

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for waiting on a server event
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Directory where snapshots received from the server are promoted
    pub save_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:25555"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            response_timeout: Duration::from_secs(30),
            save_dir: PathBuf::from("client-saves"),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        if self.save_dir.as_os_str().is_empty() {
            errors.push("Client save directory cannot be empty".to_string());
        }

        errors
    }
}

/// Layout of the persisted record directories
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding every record directory
    pub root: PathBuf,

    /// One file per user, keyed by username
    pub users_dir: String,

    /// One file per site, keyed by tile
    pub sites_dir: String,

    /// One file per settlement, keyed by tile
    pub settlements_dir: String,

    /// One snapshot per user
    pub saves_dir: String,

    /// Encoding of persisted records
    pub format: SerializationFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            users_dir: String::from("users"),
            sites_dir: String::from("sites"),
            settlements_dir: String::from("settlements"),
            saves_dir: String::from("saves"),
            format: SerializationFormat::Json,
        }
    }
}

impl StorageConfig {
    /// Storage rooted at `root` with the default layout
    pub fn rooted<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn users_path(&self) -> PathBuf {
        self.root.join(&self.users_dir)
    }

    pub fn sites_path(&self) -> PathBuf {
        self.root.join(&self.sites_dir)
    }

    pub fn settlements_path(&self) -> PathBuf {
        self.root.join(&self.settlements_dir)
    }

    pub fn saves_path(&self) -> PathBuf {
        self.root.join(&self.saves_dir)
    }

    /// Validate storage configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.root.as_os_str().is_empty() {
            errors.push("Storage root cannot be empty".to_string());
        }

        let dirs = [
            ("users_dir", &self.users_dir),
            ("sites_dir", &self.sites_dir),
            ("settlements_dir", &self.settlements_dir),
            ("saves_dir", &self.saves_dir),
        ];
        for (name, dir) in dirs {
            if dir.is_empty() {
                errors.push(format!("Storage {name} cannot be empty"));
            }
        }

        for (i, (name_a, a)) in dirs.iter().enumerate() {
            for (name_b, b) in dirs.iter().skip(i + 1) {
                if a == b && !a.is_empty() {
                    errors.push(format!(
                        "Storage {name_a} and {name_b} must differ (both '{a}')"
                    ));
                }
            }
        }

        errors
    }
}

/// Snapshot transfer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Size of one transfer part in bytes
    pub part_size_bytes: usize,

    /// Compression applied to the whole snapshot before it is split
    pub compression: CompressionKind,

    /// Largest snapshot accepted after decompression
    pub max_snapshot_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            part_size_bytes: DEFAULT_PART_SIZE,
            compression: CompressionKind::Zstd,
            max_snapshot_size: 512 * 1024 * 1024,
        }
    }
}

impl TransferConfig {
    /// Validate transfer configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.part_size_bytes == 0 {
            errors.push("Transfer part size cannot be 0".to_string());
        } else if self.part_size_bytes > MAX_PAYLOAD_SIZE - PART_ENVELOPE_RESERVE {
            errors.push(format!(
                "Transfer part size too large: {} bytes (maximum: {} bytes)",
                self.part_size_bytes,
                MAX_PAYLOAD_SIZE - PART_ENVELOPE_RESERVE
            ));
        }

        if self.max_snapshot_size == 0 {
            errors.push("Max snapshot size cannot be 0".to_string());
        }

        errors
    }
}

/// Rules applied during the account handshake
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Client version that must match exactly
    pub server_version: String,

    /// Only whitelisted usernames may log in
    pub use_whitelist: bool,

    /// Usernames allowed when the whitelist is active
    pub whitelisted_users: Vec<String>,

    /// Longest accepted username
    pub max_username_len: usize,

    /// Longest accepted password
    pub max_password_len: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            use_whitelist: false,
            whitelisted_users: Vec::new(),
            max_username_len: 32,
            max_password_len: 64,
        }
    }
}

impl AccessConfig {
    /// Validate access configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_version.trim().is_empty() {
            errors.push("Server version cannot be empty".to_string());
        }

        if self.max_username_len == 0 {
            errors.push("Max username length must be greater than 0".to_string());
        }

        if self.max_password_len == 0 {
            errors.push("Max password length must be greater than 0".to_string());
        }

        if self.use_whitelist && self.whitelisted_users.is_empty() {
            errors.push("Whitelist is enabled but lists no users".to_string());
        }

        errors
    }
}

/// World-object feature configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Whether site packets are accepted at all
    pub enable_sites: bool,

    /// Interval of the periodic reward tick
    #[serde(with = "duration_serde")]
    pub reward_interval: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            enable_sites: true,
            reward_interval: timeout::REWARD_INTERVAL,
        }
    }
}

impl WorldConfig {
    /// Validate world configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.reward_interval.as_millis() < 10 {
            errors.push("Reward interval too short (minimum: 10ms)".to_string());
        } else if self.reward_interval.as_secs() > 24 * 3600 {
            errors.push("Reward interval too long (maximum: 24 hours)".to_string());
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

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("world-session"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
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

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
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
