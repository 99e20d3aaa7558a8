//! Configuration for the Huddle client core.
//!
//! Layered configuration with the following priority (highest first):
//! 1. Values the embedding application sets on [`ClientConfig`] directly
//! 2. TOML config file (`~/.config/huddle/config.toml`)
//! 3. Compiled defaults
//!
//! A missing config file is not an error (defaults are used). An explicit
//! path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::socket::SocketConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    socket: SocketFileConfig,
    delivery: DeliveryFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    attempt_timeout_secs: Option<u64>,
}

/// `[socket]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SocketFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    queue_capacity: Option<usize>,
}

/// `[delivery]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DeliveryFileConfig {
    ack_flush_delay_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the HTTP API.
    pub api_base_url: Option<String>,
    /// Per-attempt timeout for authenticated requests.
    pub attempt_timeout: Duration,
    /// WebSocket endpoint URL.
    pub socket_url: Option<String>,
    /// Timeout for the socket handshake.
    pub connect_timeout: Duration,
    /// Maximum frames held for offline senders.
    pub queue_capacity: usize,
    /// Delay before an acknowledgement batch is flushed.
    pub ack_flush_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            attempt_timeout: Duration::from_secs(15),
            socket_url: None,
            connect_timeout: Duration::from_secs(10),
            queue_capacity: 64,
            ack_flush_delay: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file merged over compiled defaults.
    ///
    /// If `explicit_path` is given the file must exist. Otherwise the
    /// default path (`~/.config/huddle/config.toml`) is tried and silently
    /// ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = load_config_file(explicit_path)?;
        Ok(Self::resolve(&file))
    }

    /// Resolve a `ClientConfig` from a parsed config file.
    ///
    /// Priority: file > default. Separated from `load()` to enable unit
    /// testing without touching the filesystem.
    #[must_use]
    fn resolve(file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: file.api.base_url.clone(),
            attempt_timeout: file
                .api
                .attempt_timeout_secs
                .map_or(defaults.attempt_timeout, Duration::from_secs),
            socket_url: file.socket.url.clone(),
            connect_timeout: file
                .socket
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            queue_capacity: file
                .socket
                .queue_capacity
                .unwrap_or(defaults.queue_capacity),
            ack_flush_delay: file
                .delivery
                .ack_flush_delay_ms
                .map_or(defaults.ack_flush_delay, Duration::from_millis),
        }
    }

    /// Build a [`SocketConfig`] from this configuration, if a socket URL
    /// is present.
    #[must_use]
    pub fn to_socket_config(&self) -> Option<SocketConfig> {
        let url = self.socket_url.clone()?;
        Some(SocketConfig {
            url,
            connect_timeout: self.connect_timeout,
            queue_capacity: self.queue_capacity,
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and a missing
/// file is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir available — use defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("huddle").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
