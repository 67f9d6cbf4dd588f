//! Configuration Module
//!
//! Cache-level defaults and connection pool settings, with an optional
//! environment variable loader.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default number of pooled store connections.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Default wait for a pooled connection.
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default minimum serialized size, in bytes, before a value is compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Cache configuration parameters.
///
/// Fixed for the lifetime of a [`Cache`](crate::Cache). `namespace` and
/// `expires_in` act as defaults that per-call options may override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Namespace prefixed to every key unless a call overrides it
    pub namespace: Option<String>,
    /// Expiration applied to writes unless a call overrides it
    pub expires_in: Option<Duration>,
    /// Whether large values are compressed before storage
    pub compress: bool,
    /// Serialized size in bytes at or above which values are compressed
    pub compression_threshold: usize,
    /// Maximum number of pooled store connections
    pub pool_size: usize,
    /// Longest wait for a pooled connection before failing
    pub pool_timeout: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Default namespace (default: none)
    /// - `CACHE_EXPIRES_IN` - Default expiration in seconds (default: none)
    /// - `CACHE_COMPRESS` - Enable compression, `true`/`false` (default: false)
    /// - `CACHE_COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 1024)
    /// - `CACHE_POOL_SIZE` - Pool size (default: 5)
    /// - `CACHE_POOL_TIMEOUT_MS` - Pool checkout timeout in milliseconds (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: env::var("CACHE_NAMESPACE").ok().filter(|v| !v.is_empty()),
            expires_in: env::var("CACHE_EXPIRES_IN")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            compress: env::var("CACHE_COMPRESS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.compress),
            compression_threshold: env::var("CACHE_COMPRESSION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.compression_threshold),
            pool_size: env::var("CACHE_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pool_size),
            pool_timeout: env::var("CACHE_POOL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.pool_timeout),
        }
    }

    /// Sets the default namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the default expiration.
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Enables or disables compression.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Sets the compression threshold in bytes.
    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    /// Sets the pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the pool checkout timeout.
    pub fn pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = timeout;
        self
    }

    // == Validate ==
    /// Rejects settings no pool can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(CacheError::Configuration(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.expires_in == Some(Duration::ZERO) {
            return Err(CacheError::Configuration(
                "expires_in must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            expires_in: None,
            compress: false,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            pool_size: DEFAULT_POOL_SIZE,
            pool_timeout: DEFAULT_POOL_TIMEOUT,
        }
    }
}
