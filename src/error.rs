//! Error types for Blockverse

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    InvalidBlock(String),
    InvalidTransaction(String),
    BlockNotFound(String),
    NetworkError(String),
    Timeout(String),
    CryptoError(String),
    DatabaseError(String),
    IoError(String),
    BincodeError(String),
    ConfigError(String),
}

impl ChainError {
    /// Block or transaction rejected on structural or consistency grounds.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidBlock(_) | ChainError::InvalidTransaction(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ChainError::BlockNotFound(_))
    }

    /// Peer unreachable: dial failure, timeout or a remote error.
    pub fn is_network(&self) -> bool {
        matches!(self, ChainError::NetworkError(_) | ChainError::Timeout(_))
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            ChainError::BlockNotFound(msg) => write!(f, "Block not found: {}", msg),
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            ChainError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            ChainError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::BincodeError(msg) => write!(f, "Bincode error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::BincodeError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
