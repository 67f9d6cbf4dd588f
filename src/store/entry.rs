//! Stored Entry Module
//!
//! Defines the structure for values held by the in-process store.

use std::time::{Duration, Instant};

// == Stored Entry ==
/// Represents a single stored value with its optional expiration.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Expiration deadline, None = no expiration
    pub expires_at: Option<Instant>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry that expires after `ttl`, or never when `ttl` is None.
    pub fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its deadline.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has a deadline in the future
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
