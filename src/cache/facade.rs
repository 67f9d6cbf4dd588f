//! Cache Façade Module
//!
//! The public cache API. Every operation resolves its options, namespaces
//! its keys, checks a connection out of the pool inside an instrumentation
//! event, runs its store command(s) and transforms values on the way in or
//! out. Connections go back to the pool when the operation's future
//! completes or is dropped.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use deadpool::managed::{PoolError, TimeoutType};
use deadpool::Runtime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::compression::Compressor;
use crate::cache::namespace::namespace_key;
use crate::cache::options::Options;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::instrument::{instrument, Event, Instrumenter, Operation, TracingInstrumenter};
use crate::store::{MemoryStore, PooledConnection, SetCommand, StoreManager, StorePool};

/// Key reported in the `clear` event, which is not scoped to any key.
pub const CLEAR_ALL_KEY: &str = "*";

// == Cache ==
/// Namespaced, optionally compressing cache over a pool of store connections.
///
/// Cloning is cheap; clones share the pool and configuration.
#[derive(Clone)]
pub struct Cache {
    pool: StorePool,
    config: Arc<CacheConfig>,
    compressor: Compressor,
    instrumenter: Arc<dyn Instrumenter>,
}

impl Cache {
    // == Constructors ==
    /// Creates a cache for the store at `url`.
    ///
    /// `redis://`, `rediss://` and `unix://` URLs go to the Redis client;
    /// `memory://` creates a fresh in-process store. No connection is made
    /// until the first operation.
    ///
    /// # Errors
    /// [`CacheError::Configuration`] for a malformed URL or invalid config.
    pub fn new(url: &str, config: CacheConfig) -> Result<Self> {
        let manager = StoreManager::from_url(url)?;
        Self::build(manager, config)
    }

    /// Creates a cache over an existing in-process store.
    pub fn with_memory_store(store: MemoryStore, config: CacheConfig) -> Result<Self> {
        Self::build(StoreManager::Memory(store), config)
    }

    fn build(manager: StoreManager, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = manager.kind();

        let pool = StorePool::builder(manager)
            .max_size(config.pool_size)
            .wait_timeout(Some(config.pool_timeout))
            .create_timeout(Some(config.pool_timeout))
            .recycle_timeout(Some(config.pool_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CacheError::Configuration(e.to_string()))?;

        info!(
            store,
            namespace = config.namespace.as_deref().unwrap_or(""),
            compress = config.compress,
            pool_size = config.pool_size,
            "Cache initialized"
        );

        Ok(Self {
            pool,
            compressor: Compressor::new(config.compress, config.compression_threshold),
            config: Arc::new(config),
            instrumenter: Arc::new(TracingInstrumenter),
        })
    }

    /// Replaces the instrumentation hook.
    pub fn with_instrumenter(mut self, instrumenter: Arc<dyn Instrumenter>) -> Self {
        self.instrumenter = instrumenter;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the pool's current size and availability.
    pub fn status(&self) -> deadpool::Status {
        self.pool.status()
    }

    // == Connection ==
    /// Checks a raw connection out of the pool.
    ///
    /// The connection counts against the pool until dropped.
    pub async fn connection(&self) -> Result<PooledConnection> {
        self.checkout().await
    }

    async fn checkout(&self) -> Result<PooledConnection> {
        self.pool.get().await.map_err(|err| match err {
            PoolError::Timeout(TimeoutType::Wait) => {
                warn!(
                    timeout_ms = self.config.pool_timeout.as_millis() as u64,
                    "No pooled connection available"
                );
                CacheError::PoolTimeout(self.config.pool_timeout)
            }
            PoolError::Timeout(TimeoutType::Create) => {
                CacheError::store("CONNECT", "timed out opening a connection")
            }
            PoolError::Timeout(_) => CacheError::store("PING", "timed out recycling a connection"),
            PoolError::Backend(err) => err,
            PoolError::Closed => CacheError::PoolClosed,
            other => CacheError::Configuration(other.to_string()),
        })
    }

    /// Runs `operation` inside an instrumentation event for `event`.
    async fn invoke<T, F>(&self, event: Event, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        instrument(self.instrumenter.as_ref(), event, operation).await
    }

    // == Value Transform ==
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let raw = serde_json::to_vec(value)?;
        self.compressor.pack(raw)
    }

    fn decode<T: DeserializeOwned>(&self, stored: Vec<u8>) -> Result<T> {
        let raw = self.compressor.unpack(stored)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    // == Read ==
    /// Returns the value under `key`, or None when absent.
    pub async fn read<T: DeserializeOwned>(
        &self,
        key: &str,
        options: &Options,
    ) -> Result<Option<T>> {
        let resolved = options.resolve(&self.config);
        let store_key = namespace_key(key, resolved.namespace);

        self.invoke(Event::single(Operation::Read, key), async {
            let stored = self.checkout().await?.get(&store_key).await?;
            stored.map(|bytes| self.decode(bytes)).transpose()
        })
        .await
    }

    // == Write ==
    /// Stores `value` under `key`, with the resolved expiration if any.
    ///
    /// Returns the store's acknowledgement.
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: &Options,
    ) -> Result<bool> {
        let resolved = options.resolve(&self.config);
        let store_key = namespace_key(key, resolved.namespace);

        self.invoke(Event::single(Operation::Write, key), async {
            let payload = self.encode(value)?;
            self.checkout()
                .await?
                .set(&store_key, payload, resolved.expires_in)
                .await
        })
        .await
    }

    // == Delete ==
    /// Removes `key`, returning how many entries were deleted.
    pub async fn delete(&self, key: &str, options: &Options) -> Result<u64> {
        let resolved = options.resolve(&self.config);
        let store_key = namespace_key(key, resolved.namespace);

        self.invoke(Event::single(Operation::Delete, key), async {
            self.checkout().await?.del(&store_key).await
        })
        .await
    }

    // == Exist ==
    pub async fn exist(&self, key: &str, options: &Options) -> Result<bool> {
        let resolved = options.resolve(&self.config);
        let store_key = namespace_key(key, resolved.namespace);

        self.invoke(Event::single(Operation::Exist, key), async {
            self.checkout().await?.exists(&store_key).await
        })
        .await
    }

    // == Fetch ==
    /// Returns the cached value, computing and storing it on a miss.
    ///
    /// Only an absent key counts as a miss; a cached empty string, zero or
    /// `false` is returned as-is. With `force` set the read is skipped and
    /// the value always recomputed and overwritten.
    pub async fn fetch<T, F>(&self, key: &str, options: &Options, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> T,
    {
        if !options.resolve(&self.config).force {
            if let Some(cached) = self.read(key, options).await? {
                return Ok(cached);
            }
        }

        let value = compute(key);
        self.write(key, &value, options).await?;
        Ok(value)
    }

    // == Increment / Decrement ==
    /// Adds one to the counter under `key`, creating it at 1 when absent.
    pub async fn increment(&self, key: &str, options: &Options) -> Result<i64> {
        self.increment_by(key, 1, options).await
    }

    pub async fn increment_by(&self, key: &str, amount: i64, options: &Options) -> Result<i64> {
        let resolved = options.resolve(&self.config);
        let store_key = namespace_key(key, resolved.namespace);

        self.invoke(Event::single(Operation::Increment, key), async {
            self.checkout().await?.incr_by(&store_key, amount).await
        })
        .await
    }

    /// Subtracts one from the counter under `key`, creating it at -1 when absent.
    pub async fn decrement(&self, key: &str, options: &Options) -> Result<i64> {
        self.decrement_by(key, 1, options).await
    }

    pub async fn decrement_by(&self, key: &str, amount: i64, options: &Options) -> Result<i64> {
        let resolved = options.resolve(&self.config);
        let store_key = namespace_key(key, resolved.namespace);

        self.invoke(Event::single(Operation::Decrement, key), async {
            self.checkout().await?.decr_by(&store_key, amount).await
        })
        .await
    }

    // == Read Multi ==
    /// Reads every key in one round trip.
    ///
    /// Returns `(raw key, value)` pairs in input order, misses included as None.
    pub async fn read_multi<T, K>(
        &self,
        keys: &[K],
        options: &Options,
    ) -> Result<Vec<(String, Option<T>)>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let resolved = options.resolve(&self.config);
        let raw_keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let store_keys: Vec<String> = raw_keys
            .iter()
            .map(|k| namespace_key(k, resolved.namespace))
            .collect();

        let values = self
            .invoke(Event::new(Operation::ReadMulti, raw_keys.clone()), async {
                let stored = self.checkout().await?.mget(&store_keys).await?;
                stored
                    .into_iter()
                    .map(|bytes| bytes.map(|b| self.decode::<T>(b)).transpose())
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        Ok(raw_keys.into_iter().zip(values).collect())
    }

    // == Write Multi ==
    /// Writes every entry in one pipelined round trip.
    pub async fn write_multi<K, T>(&self, entries: &[(K, T)], options: &Options) -> Result<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        if entries.is_empty() {
            return Ok(());
        }
        let resolved = options.resolve(&self.config);
        let raw_keys = entries.iter().map(|(k, _)| k.as_ref().to_string()).collect();

        self.invoke(Event::new(Operation::WriteMulti, raw_keys), async {
            let commands = entries
                .iter()
                .map(|(key, value)| -> Result<SetCommand> {
                    Ok(SetCommand {
                        key: namespace_key(key.as_ref(), resolved.namespace),
                        value: self.encode(value)?,
                        ttl: resolved.expires_in,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            self.checkout().await?.pipeline(&commands).await
        })
        .await
    }

    // == Fetch Multi ==
    /// Reads every key, computing and storing the misses.
    ///
    /// Computed values are written together in one pipelined round trip:
    /// commands run in order, and a failure part-way leaves earlier writes
    /// in place. Returns `(raw key, value)` pairs in input order.
    pub async fn fetch_multi<T, K, F>(
        &self,
        keys: &[K],
        options: &Options,
        mut compute: F,
    ) -> Result<Vec<(String, T)>>
    where
        T: Serialize + DeserializeOwned,
        K: AsRef<str>,
        F: FnMut(&str) -> T,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let cached = self.read_multi::<T, K>(keys, options).await?;
        let resolved = options.resolve(&self.config);
        let raw_keys = cached.iter().map(|(key, _)| key.clone()).collect();

        self.invoke(Event::new(Operation::FetchMulti, raw_keys), async {
            let mut results = Vec::with_capacity(cached.len());
            let mut writes = Vec::new();

            for (key, value) in cached {
                let value = match value {
                    Some(hit) => hit,
                    None => {
                        let computed = compute(&key);
                        writes.push(SetCommand {
                            key: namespace_key(&key, resolved.namespace),
                            value: self.encode(&computed)?,
                            ttl: resolved.expires_in,
                        });
                        computed
                    }
                };
                results.push((key, value));
            }

            if !writes.is_empty() {
                self.checkout().await?.pipeline(&writes).await?;
            }
            Ok(results)
        })
        .await
    }

    // == Clear ==
    /// Flushes the whole store, not just this cache's namespace.
    pub async fn clear(&self) -> Result<()> {
        self.invoke(Event::single(Operation::Clear, CLEAR_ALL_KEY), async {
            self.checkout().await?.flushdb().await
        })
        .await
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("compressor", &self.compressor)
            .field("status", &self.pool.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn memory_cache(config: CacheConfig) -> (Cache, MemoryStore) {
        let store = MemoryStore::new();
        let cache = Cache::with_memory_store(store.clone(), config).unwrap();
        (cache, store)
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let result = Cache::new("ftp://example.com", CacheConfig::default());
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_new_rejects_zero_pool() {
        let result = Cache::new("memory://", CacheConfig::default().pool_size(0));
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_status_reports_pool_size() {
        let cache = Cache::new("memory://", CacheConfig::default().pool_size(3)).unwrap();
        assert_eq!(cache.status().max_size, 3);
    }

    #[tokio::test]
    async fn test_write_uses_namespaced_key() {
        let (cache, store) = memory_cache(CacheConfig::default().namespace("app"));

        cache.write("user", "alice", &Options::new()).await.unwrap();

        assert!(store.exists("app:user").await);
        assert!(!store.exists("user").await);
    }

    #[tokio::test]
    async fn test_write_stores_json() {
        let (cache, store) = memory_cache(CacheConfig::default());

        cache.write("n", &7u32, &Options::new()).await.unwrap();
        assert_eq!(store.get("n").await, Some(b"7".to_vec()));
    }

    #[tokio::test]
    async fn test_default_expiration_applied() {
        let (cache, store) =
            memory_cache(CacheConfig::default().expires_in(Duration::from_secs(30)));

        cache.write("k", "v", &Options::new()).await.unwrap();

        let ttl = store.ttl("k").await.unwrap();
        assert!(ttl <= Duration::from_secs(30));
        assert!(ttl > Duration::from_secs(29));
    }

    #[tokio::test]
    async fn test_compression_applies_above_threshold() {
        let (cache, store) = memory_cache(
            CacheConfig::default()
                .compress(true)
                .compression_threshold(64),
        );
        let large = "a".repeat(500);

        cache.write("small", "tiny", &Options::new()).await.unwrap();
        cache.write("large", &large, &Options::new()).await.unwrap();

        let small_raw = store.get("small").await.unwrap();
        let large_raw = store.get("large").await.unwrap();
        assert!(!crate::cache::is_compressed(&small_raw));
        assert!(crate::cache::is_compressed(&large_raw));

        let read: Option<String> = cache.read("large", &Options::new()).await.unwrap();
        assert_eq!(read, Some(large));
    }

    #[tokio::test]
    async fn test_counter_readable_as_integer() {
        let (cache, _) =
            memory_cache(CacheConfig::default().compress(true).compression_threshold(0));

        cache.increment_by("hits", 41, &Options::new()).await.unwrap();
        cache.increment("hits", &Options::new()).await.unwrap();

        let hits: Option<i64> = cache.read("hits", &Options::new()).await.unwrap();
        assert_eq!(hits, Some(42));
    }
}
