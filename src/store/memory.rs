//! In-Process Store Module
//!
//! A HashMap-backed store with Redis-compatible semantics for the commands
//! the cache issues. Selected with a `memory://` URL; handles are cheap to
//! clone and share one underlying map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::{SetCommand, StoreStats, StoredEntry};
use crate::error::{CacheError, Result};

const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
const OVERFLOW: &str = "ERR increment or decrement would overflow";
const INVALID_EXPIRE: &str = "ERR invalid expire time in 'set' command";

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, StoredEntry>,
    stats: StoreStats,
}

impl Inner {
    /// Drops the entry under `key` if it has expired.
    fn purge_if_expired(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(StoredEntry::is_expired) {
            self.entries.remove(key);
        }
    }

    fn lookup(&mut self, key: &str) -> Option<Vec<u8>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    fn store(&mut self, command: &SetCommand) -> Result<()> {
        if command.ttl == Some(Duration::ZERO) {
            return Err(CacheError::store("SET", INVALID_EXPIRE));
        }
        self.entries.insert(
            command.key.clone(),
            StoredEntry::new(command.value.clone(), command.ttl),
        );
        Ok(())
    }

    fn sync_count(&mut self) {
        let count = self.entries.len();
        self.stats.set_total_entries(count);
    }
}

// == Memory Store ==
/// Shared in-process key-value store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the live value under `key`, purging it first if expired.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.write().await;
        let value = inner.lookup(key);
        inner.sync_count();
        value
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous value and TTL.
    ///
    /// A zero `ttl` is rejected the way Redis rejects `SET ... PX 0`.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let command = SetCommand {
            key: key.to_string(),
            value,
            ttl,
        };
        let mut inner = self.inner.write().await;
        inner.store(&command)?;
        inner.sync_count();
        Ok(true)
    }

    // == Delete ==
    /// Removes `key`, returning the number of live entries removed.
    pub async fn del(&self, key: &str) -> u64 {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);
        let removed = inner.entries.remove(key).is_some();
        inner.sync_count();
        u64::from(removed)
    }

    // == Exists ==
    pub async fn exists(&self, key: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);
        let found = inner.entries.contains_key(key);
        inner.sync_count();
        found
    }

    // == Increment ==
    /// Adds `delta` to the integer under `key`, starting from 0 when absent.
    ///
    /// The entry keeps its TTL. Fails when the stored value is not a decimal
    /// integer or the result would overflow.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let command = if delta < 0 { "DECRBY" } else { "INCRBY" };
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);

        let current = match inner.entries.get(key) {
            Some(entry) => std::str::from_utf8(&entry.value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| CacheError::store(command, NOT_AN_INTEGER))?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::store(command, OVERFLOW))?;

        let bytes = next.to_string().into_bytes();
        match inner.entries.get_mut(key) {
            Some(entry) => entry.value = bytes,
            None => {
                inner
                    .entries
                    .insert(key.to_string(), StoredEntry::new(bytes, None));
            }
        }
        inner.sync_count();
        Ok(next)
    }

    // == Multi Get ==
    /// Looks up every key, returning values in key order.
    pub async fn mget(&self, keys: &[String]) -> Vec<Option<Vec<u8>>> {
        let mut inner = self.inner.write().await;
        let values = keys.iter().map(|key| inner.lookup(key)).collect();
        inner.sync_count();
        values
    }

    // == Flush ==
    /// Removes every entry.
    pub async fn flushdb(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.sync_count();
    }

    // == Pipeline ==
    /// Applies `commands` in order under a single lock acquisition.
    ///
    /// Every command runs even if an earlier one fails; nothing is rolled
    /// back and the first failure is returned.
    pub async fn pipeline(&self, commands: &[SetCommand]) -> Result<()> {
        let mut inner = self.inner.write().await;
        let mut first_error = None;
        for command in commands {
            if let Err(err) = inner.store(command) {
                first_error.get_or_insert(err);
            }
        }
        inner.stats.record_pipeline();
        inner.sync_count();
        first_error.map_or(Ok(()), Err)
    }

    // == TTL ==
    /// Returns the remaining lifetime of a live key, or None when the key is
    /// absent or has no expiration.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(StoredEntry::ttl_remaining)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning the number removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - inner.entries.len();
        inner.sync_count();
        removed
    }

    // == Stats ==
    /// Returns a snapshot of the store counters.
    pub async fn stats(&self) -> StoreStats {
        self.inner.read().await.stats.clone()
    }

    /// Returns the number of entries, expired-but-unpurged included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn set_command(key: &str, value: &str, ttl: Option<Duration>) -> SetCommand {
        SetCommand {
            key: key.to_string(),
            value: value.as_bytes().to_vec(),
            ttl,
        }
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = MemoryStore::new();

        assert!(store.set("key1", b"value1".to_vec(), None).await.unwrap());
        assert_eq!(store.get("key1").await, Some(b"value1".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nonexistent").await, None);

        let stats = store.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_store_overwrite_resets_ttl() {
        let store = MemoryStore::new();

        store
            .set("key1", b"a".to_vec(), Some(Duration::from_secs(30)))
            .await
            .unwrap();
        store.set("key1", b"b".to_vec(), None).await.unwrap();

        assert_eq!(store.get("key1").await, Some(b"b".to_vec()));
        assert_eq!(store.ttl("key1").await, None);
    }

    #[tokio::test]
    async fn test_store_rejects_zero_ttl() {
        let store = MemoryStore::new();
        let result = store.set("key1", b"a".to_vec(), Some(Duration::ZERO)).await;
        assert!(matches!(
            result,
            Err(CacheError::StoreCommand { command: "SET", .. })
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = MemoryStore::new();
        store
            .set("key1", b"v".to_vec(), Some(Duration::from_millis(30)))
            .await
            .unwrap();

        assert!(store.exists("key1").await);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!store.exists("key1").await);
        assert_eq!(store.get("key1").await, None);
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = MemoryStore::new();
        store.set("key1", b"v".to_vec(), None).await.unwrap();

        assert_eq!(store.del("key1").await, 1);
        assert_eq!(store.del("key1").await, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_incr_from_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_by("counter", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("counter", 1).await.unwrap(), 2);
        assert_eq!(store.incr_by("counter", -5).await.unwrap(), -3);
        assert_eq!(store.get("counter").await, Some(b"-3".to_vec()));
    }

    #[tokio::test]
    async fn test_store_incr_keeps_ttl() {
        let store = MemoryStore::new();
        store
            .set("counter", b"10".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(store.incr_by("counter", 1).await.unwrap(), 11);
        assert!(store.ttl("counter").await.is_some());
    }

    #[tokio::test]
    async fn test_store_incr_wrong_type() {
        let store = MemoryStore::new();
        store.set("text", b"\"hello\"".to_vec(), None).await.unwrap();

        let result = store.incr_by("text", 1).await;
        assert!(matches!(
            result,
            Err(CacheError::StoreCommand { command: "INCRBY", .. })
        ));
    }

    #[tokio::test]
    async fn test_store_incr_overflow() {
        let store = MemoryStore::new();
        store
            .set("counter", i64::MAX.to_string().into_bytes(), None)
            .await
            .unwrap();
        assert!(store.incr_by("counter", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_store_mget_preserves_order() {
        let store = MemoryStore::new();
        store.set("b", b"2".to_vec(), None).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.mget(&keys).await;
        assert_eq!(values, vec![None, Some(b"2".to_vec()), None]);
    }

    #[tokio::test]
    async fn test_store_pipeline_applies_in_order() {
        let store = MemoryStore::new();
        let commands = vec![
            set_command("k", "first", None),
            set_command("k", "second", None),
            set_command("other", "x", Some(Duration::from_secs(5))),
        ];

        store.pipeline(&commands).await.unwrap();

        assert_eq!(store.get("k").await, Some(b"second".to_vec()));
        assert!(store.ttl("other").await.is_some());
        assert_eq!(store.stats().await.pipelines, 1);
    }

    #[tokio::test]
    async fn test_store_pipeline_no_rollback() {
        let store = MemoryStore::new();
        let commands = vec![
            set_command("a", "1", None),
            set_command("bad", "2", Some(Duration::ZERO)),
            set_command("c", "3", None),
        ];

        assert!(store.pipeline(&commands).await.is_err());
        assert_eq!(store.get("a").await, Some(b"1".to_vec()));
        assert_eq!(store.get("bad").await, None);
        assert_eq!(store.get("c").await, Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_store_flushdb() {
        let store = MemoryStore::new();
        store.set("a", b"1".to_vec(), None).await.unwrap();
        store.set("b", b"2".to_vec(), None).await.unwrap();

        store.flushdb().await;
        assert!(store.is_empty().await);
        assert_eq!(store.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_store_cleanup_expired() {
        let store = MemoryStore::new();
        store
            .set("short", b"1".to_vec(), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        store
            .set("long", b"2".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.exists("long").await);
    }

    #[tokio::test]
    async fn test_store_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        handle.set("shared", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.get("shared").await, Some(b"v".to_vec()));
    }
}
