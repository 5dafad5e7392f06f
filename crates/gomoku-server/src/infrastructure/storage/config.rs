//! TOML configuration file for the server.
//!
//! Every field is optional; anything missing falls back to the default via
//! `#[serde(default = "...")]`, so a partial file (or none at all) works.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! log_level = "info"
//!
//! [sessions]
//! idle_timeout_secs = 0     # 0 disables the idle check
//! outbound_queue = 256
//! max_line_length = 1024
//!
//! [rooms]
//! finished_ttl_secs = 300
//! sweep_interval_secs = 30
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{ServerConfig, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The bind address is not an IP address.
    #[error("invalid bind address: {0:?}")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub sessions: SessionSection,
    #[serde(default)]
    pub rooms: RoomSection,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Per-connection limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default)]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

/// Finished-room eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSection {
    #[serde(default = "default_finished_ttl_secs")]
    pub finished_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_outbound_queue() -> usize {
    256
}
fn default_max_line_length() -> usize {
    1024
}
fn default_finished_ttl_secs() -> u64 {
    300
}
fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 0,
            outbound_queue: default_outbound_queue(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for RoomSection {
    fn default() -> Self {
        Self {
            finished_ttl_secs: default_finished_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl FileConfig {
    /// Resolves the file settings into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP
    /// address.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.bind_address.clone()))?;
        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            idle_timeout: ServerConfig::idle_timeout_from_secs(self.sessions.idle_timeout_secs),
            outbound_queue: self.sessions.outbound_queue,
            max_line_length: self.sessions.max_line_length,
            finished_ttl: Duration::from_secs(self.rooms.finished_ttl_secs),
            sweep_interval: Duration::from_secs(self.rooms.sweep_interval_secs),
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads configuration from `path`, returning defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
