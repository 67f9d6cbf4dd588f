//! TTL Cleanup Task
//!
//! Background task that periodically purges expired entries from an
//! in-process store. Expired entries are already invisible to reads; this
//! only reclaims their memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a background task that periodically removes expired entries.
///
/// # Arguments
/// * `store` - Handle to the store to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task; abort it to stop sweeping.
///
/// # Example
/// ```ignore
/// let store = MemoryStore::new();
/// let cleanup_handle = spawn_cleanup_task(store.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: MemoryStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = MemoryStore::new();
        store
            .set("expire_soon", b"value".to_vec(), Some(Duration::from_millis(20)))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), Duration::from_millis(50));

        // Wait for entry to expire and cleanup to run
        tokio::time::sleep(Duration::from_millis(200)).await;

        // len counts unpurged entries, so zero means the sweep ran
        assert_eq!(store.len().await, 0, "Expired entry should have been purged");

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = MemoryStore::new();
        store
            .set("long_lived", b"value".to_vec(), Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("long_lived").await, Some(b"value".to_vec()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(MemoryStore::new(), Duration::from_millis(50));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
