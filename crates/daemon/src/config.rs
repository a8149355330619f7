//! Configuration management for the dgftp server and client.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/dgftp/config.toml`.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use protocol::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::server::{ServerSettings, DEFAULT_PORT};
use crate::session::SessionSettings;
use crate::transfer::TransferTimings;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("bind_address must be an IP address, got {0}")]
    InvalidBindAddress(String),

    #[error("max_workers must be at most 4096, got {0}")]
    InvalidMaxWorkers(usize),

    #[error("chunk_size must be between 1 and 65507, got {0}")]
    InvalidChunkSize(usize),

    #[error("{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("server_address must be host:port, got {0}")]
    InvalidServerAddress(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for an explicit worker count.
const MAX_WORKERS: usize = 4096;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General process configuration.
    pub daemon: DaemonConfig,

    /// Server listener configuration.
    pub server: ServerConfig,

    /// Session loop configuration.
    pub session: SessionConfig,

    /// Datagram transfer configuration.
    pub transfer: TransferConfig,

    /// Interactive client configuration.
    pub client: ClientConfig,
}

/// General process configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Server listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address the control listener binds to.
    pub bind_address: String,

    /// Control-channel port.
    pub port: u16,

    /// Directory served to clients.
    pub root: PathBuf,
}

/// Session loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Concurrent session cap (0 = four per CPU).
    pub max_workers: usize,

    /// Seconds a session may sit without a command.
    pub idle_timeout_secs: u64,

    /// Seconds a new connection has to send its handshake.
    pub handshake_timeout_secs: u64,

    /// Pause after each command in milliseconds.
    pub command_pacing_ms: u64,
}

/// Datagram transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum payload per datagram requested by the client.
    pub chunk_size: usize,

    /// Delay between datagrams in milliseconds (0 = unpaced).
    pub send_pacing_ms: u64,

    /// Milliseconds the client waits for a descriptor.
    pub descriptor_timeout_ms: u64,

    /// Milliseconds the client waits for each chunk.
    pub chunk_timeout_ms: u64,
}

/// Interactive client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Server control address, `host:port`.
    pub server_address: String,

    /// Directory downloads are written to.
    pub download_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            root: PathBuf::from("."),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            idle_timeout_secs: 300,
            handshake_timeout_secs: 10,
            command_pacing_ms: 1,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            send_pacing_ms: 2,
            descriptor_timeout_ms: 3000,
            chunk_timeout_ms: 1000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: format!("127.0.0.1:{}", DEFAULT_PORT),
            download_dir: PathBuf::from("."),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dgftp")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - DGFTP_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - DGFTP_ROOT: Override the served directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("DGFTP_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(root) = std::env::var("DGFTP_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root from environment: {}", root);
                self.server.root = PathBuf::from(root);
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        if self.server.bind_address.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddress(
                self.server.bind_address.clone(),
            ));
        }

        if self.session.max_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidMaxWorkers(self.session.max_workers));
        }
        if self.session.idle_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("idle_timeout_secs"));
        }
        if self.session.handshake_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("handshake_timeout_secs"));
        }

        if self.transfer.chunk_size == 0 || self.transfer.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidChunkSize(self.transfer.chunk_size));
        }
        if self.transfer.descriptor_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("descriptor_timeout_ms"));
        }
        if self.transfer.chunk_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("chunk_timeout_ms"));
        }

        // host:port, host may be a name
        match self.client.server_address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(ConfigError::InvalidServerAddress(
                    self.client.server_address.clone(),
                ))
            }
        }

        Ok(())
    }

    /// Server settings derived from the `[server]`, `[session]` and
    /// `[transfer]` sections.
    pub fn server_settings(&self) -> Result<ServerSettings, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))?;

        Ok(ServerSettings {
            bind_address: SocketAddr::new(ip, self.server.port),
            root: self.server.root.clone(),
            max_workers: self.session.max_workers,
            handshake_timeout: Duration::from_secs(self.session.handshake_timeout_secs),
            send_pacing: Duration::from_millis(self.transfer.send_pacing_ms),
            session: SessionSettings {
                idle_timeout: Duration::from_secs(self.session.idle_timeout_secs),
                command_pacing: Duration::from_millis(self.session.command_pacing_ms),
            },
        })
    }

    /// Transfer timings from the `[transfer]` section.
    pub fn transfer_timings(&self) -> TransferTimings {
        TransferTimings {
            send_pacing: Duration::from_millis(self.transfer.send_pacing_ms),
            descriptor_timeout: Duration::from_millis(self.transfer.descriptor_timeout_ms),
            chunk_timeout: Duration::from_millis(self.transfer.chunk_timeout_ms),
        }
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
