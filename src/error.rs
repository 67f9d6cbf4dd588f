//! Error types for the cache client
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache operation.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid connection target or option at construction time
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// No pooled connection became available within the configured wait
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),

    /// The connection pool was closed while an operation was waiting on it
    #[error("Connection pool is closed")]
    PoolClosed,

    /// The store rejected or failed a command
    #[error("Store command {command} failed: {message}")]
    StoreCommand {
        command: &'static str,
        message: String,
    },

    /// A compressed payload could not be encoded or decoded
    #[error("Compression error: {0}")]
    Compression(String),

    /// A value could not be serialized for storage or deserialized on read
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    // == Store Command Helper ==
    /// Builds a `StoreCommand` error for the named command.
    pub fn store(command: &'static str, message: impl Into<String>) -> Self {
        CacheError::StoreCommand {
            command,
            message: message.into(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache client.
pub type Result<T> = std::result::Result<T, CacheError>;
