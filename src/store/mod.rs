//! Store Module
//!
//! Pooled connections to the key-value store the cache sits in front of:
//! a remote Redis server or the in-process [`MemoryStore`].

mod entry;
mod memory;
mod remote;
mod stats;

use std::fmt;
use std::time::Duration;

use deadpool::managed::{self, Metrics, Object, RecycleError, RecycleResult};
use tracing::debug;

use crate::error::{CacheError, Result};

// Re-export public types
pub use entry::StoredEntry;
pub use memory::MemoryStore;
pub use remote::RedisConnection;
pub use stats::StoreStats;

/// URL scheme selecting the in-process store.
pub const MEMORY_SCHEME: &str = "memory://";

/// A connection checked out of the pool. Returned to the pool on drop.
pub type PooledConnection = Object<StoreManager>;

/// The pool type owned by a cache.
pub type StorePool = managed::Pool<StoreManager>;

// == Set Command ==
/// One SET queued for a pipelined batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCommand {
    pub key: String,
    pub value: Vec<u8>,
    pub ttl: Option<Duration>,
}

// == Connection ==
/// A live store connection, as handed out by the pool.
pub enum Connection {
    Redis(RedisConnection),
    Memory(MemoryStore),
}

impl Connection {
    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Connection::Redis(conn) => conn.get(key).await,
            Connection::Memory(store) => Ok(store.get(key).await),
        }
    }

    /// Stores `value`, with an expiry when `ttl` is given.
    pub async fn set(&mut self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        match self {
            Connection::Redis(conn) => conn.set(key, &value, ttl).await,
            Connection::Memory(store) => store.set(key, value, ttl).await,
        }
    }

    pub async fn del(&mut self, key: &str) -> Result<u64> {
        match self {
            Connection::Redis(conn) => conn.del(key).await,
            Connection::Memory(store) => Ok(store.del(key).await),
        }
    }

    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        match self {
            Connection::Redis(conn) => conn.exists(key).await,
            Connection::Memory(store) => Ok(store.exists(key).await),
        }
    }

    pub async fn incr_by(&mut self, key: &str, amount: i64) -> Result<i64> {
        match self {
            Connection::Redis(conn) => conn.incr_by(key, amount).await,
            Connection::Memory(store) => store.incr_by(key, amount).await,
        }
    }

    pub async fn decr_by(&mut self, key: &str, amount: i64) -> Result<i64> {
        match self {
            Connection::Redis(conn) => conn.decr_by(key, amount).await,
            Connection::Memory(store) => {
                let delta = amount.checked_neg().ok_or_else(|| {
                    CacheError::store("DECRBY", "ERR decrement would overflow")
                })?;
                store.incr_by(key, delta).await
            }
        }
    }

    pub async fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        match self {
            Connection::Redis(conn) => conn.mget(keys).await,
            Connection::Memory(store) => Ok(store.mget(keys).await),
        }
    }

    pub async fn flushdb(&mut self) -> Result<()> {
        match self {
            Connection::Redis(conn) => conn.flushdb().await,
            Connection::Memory(store) => {
                store.flushdb().await;
                Ok(())
            }
        }
    }

    /// Runs `commands` in order in one round trip. An empty batch is a no-op.
    pub async fn pipeline(&mut self, commands: &[SetCommand]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        match self {
            Connection::Redis(conn) => conn.pipeline(commands).await,
            Connection::Memory(store) => store.pipeline(commands).await,
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self {
            Connection::Redis(conn) => conn.ping().await,
            Connection::Memory(_) => Ok(()),
        }
    }
}

// == Store Manager ==
/// Creates and recycles pooled [`Connection`]s for one store target.
#[derive(Clone)]
pub enum StoreManager {
    Redis(::redis::Client),
    Memory(MemoryStore),
}

impl StoreManager {
    /// Selects a store from its URL.
    ///
    /// `memory://` yields a fresh in-process store; anything else is handed
    /// to the Redis client, whose own validation decides what is malformed.
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with(MEMORY_SCHEME) {
            return Ok(StoreManager::Memory(MemoryStore::new()));
        }
        ::redis::Client::open(url)
            .map(StoreManager::Redis)
            .map_err(|err| CacheError::Configuration(format!("invalid store url {url:?}: {err}")))
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreManager::Redis(_) => "redis",
            StoreManager::Memory(_) => "memory",
        }
    }
}

impl fmt::Debug for StoreManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoreManager").field(&self.kind()).finish()
    }
}

impl managed::Manager for StoreManager {
    type Type = Connection;
    type Error = CacheError;

    async fn create(&self) -> Result<Connection> {
        match self {
            StoreManager::Redis(client) => {
                debug!("Opening new Redis connection");
                RedisConnection::connect(client).await.map(Connection::Redis)
            }
            StoreManager::Memory(store) => Ok(Connection::Memory(store.clone())),
        }
    }

    async fn recycle(&self, conn: &mut Connection, _: &Metrics) -> RecycleResult<CacheError> {
        conn.ping().await.map_err(RecycleError::Backend)
    }
}
