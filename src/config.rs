//! Configuration management for RustyRadish
//!
//! Loads and validates configuration from a TOML file with sensible
//! defaults, plus command line overrides applied by the server binary.

use crate::error::{Result, RustyRadishError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the RustyRadish server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    pub max_connections: usize,
    /// Size of the runtime worker pool; `None` means one worker per
    /// hardware thread.
    pub worker_threads: Option<usize>,
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: PathBuf,
    pub snapshot_interval_secs: u64,
    /// Minimum spacing between full expiry sweeps.
    pub sweep_interval_secs: u64,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub tcp_nodelay: bool,
    pub tcp_keepalive: bool,
    pub keepalive_idle_secs: u64,
    pub keepalive_interval_secs: u64,
    pub keepalive_probes: u32,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Bytes requested from the socket per read.
    pub read_chunk_size: usize,
    /// Cap on a connection's accumulated input buffer.
    pub max_buffer_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file_path: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6379,
            bind_address: "127.0.0.1".to_string(),
            max_connections: 10_000,
            worker_threads: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("dump.my_rdb"),
            snapshot_interval_secs: 300,
            sweep_interval_secs: 1,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            tcp_keepalive: true,
            keepalive_idle_secs: 60,
            keepalive_interval_secs: 10,
            keepalive_probes: 3,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            read_chunk_size: 8 * 1024,
            max_buffer_size: 4 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

impl Config {
    /// Load the default configuration.
    pub fn load() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// any section the file omits.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| RustyRadishError::ConfigError {
                message: format!("failed to read {}: {e}", path.display()),
                config_key: None,
            })?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| RustyRadishError::ConfigError {
                message: format!("failed to parse {}: {e}", path.display()),
                config_key: None,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(RustyRadishError::ConfigError {
                message: "max_connections must be greater than zero".to_string(),
                config_key: Some("server.max_connections".to_string()),
            });
        }

        if let Some(workers) = self.server.worker_threads {
            if workers == 0 {
                return Err(RustyRadishError::ConfigError {
                    message: "worker_threads must be greater than zero when set".to_string(),
                    config_key: Some("server.worker_threads".to_string()),
                });
            }
        }

        if self.storage.snapshot_interval_secs == 0 {
            return Err(RustyRadishError::ConfigError {
                message: "snapshot_interval_secs must be greater than zero".to_string(),
                config_key: Some("storage.snapshot_interval_secs".to_string()),
            });
        }

        if self.network.read_chunk_size == 0
            || self.network.read_chunk_size > self.network.max_buffer_size
        {
            return Err(RustyRadishError::ConfigError {
                message: "read_chunk_size must be nonzero and not exceed max_buffer_size"
                    .to_string(),
                config_key: Some("network.read_chunk_size".to_string()),
            });
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(RustyRadishError::ConfigError {
                message: format!("invalid log level: {other}"),
                config_key: Some("logging.level".to_string()),
            }),
        }
    }

    /// The address string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
