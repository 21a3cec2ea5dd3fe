//! Configuration management for Blockverse

use crate::error::ChainError;
use crate::network::NetworkConfig as PeerNetworkConfig;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            version: default_version(),
            bootstrap_peers: Vec::new(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Settings handed to the gossip manager.
    pub fn to_peer_config(&self) -> PeerNetworkConfig {
        PeerNetworkConfig {
            version: self.version.clone(),
            listen_addr: self.listen_addr.clone(),
            rpc_timeout: self.rpc_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Hex-encoded secp256k1 secret key. A fresh key is generated when unset.
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_block_time_secs")]
    pub block_time_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: None,
            block_time_secs: default_block_time_secs(),
        }
    }
}

impl ValidatorConfig {
    pub fn block_time(&self) -> Duration {
        Duration::from_secs(self.block_time_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Reads `path` (default `config.toml`). A missing file yields the defaults;
/// any other read failure is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ChainError> {
    let path = path.unwrap_or_else(|| Path::new("config.toml"));
    let config_str = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let config = parse_config(&config_str)?;
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str)?
    };
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate critical values
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.listen_addr.is_empty() {
            return Err(ChainError::ConfigError(
                "network.listen_addr must be set".to_string(),
            ));
        }

        if self.network.rpc_timeout_ms == 0 {
            return Err(ChainError::ConfigError(
                "network.rpc_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_empty() {
            return Err(ChainError::ConfigError(
                "storage.path must be set for the sqlite backend".to_string(),
            ));
        }

        if self.validator.block_time_secs == 0 {
            return Err(ChainError::ConfigError(
                "validator.block_time_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(key) = &self.validator.secret_key {
            if !matches!(hex::decode(key), Ok(bytes) if bytes.len() == 32) {
                return Err(ChainError::ConfigError(
                    "validator.secret_key must be 32 hex-encoded bytes".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_version() -> String {
    crate::network::PROTOCOL_VERSION.to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    5000
}

fn default_db_path() -> String {
    "./data/blocks.db".to_string()
}

fn default_block_time_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}
