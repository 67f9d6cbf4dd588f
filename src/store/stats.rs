//! Store Statistics Module
//!
//! Tracks in-process store metrics: lookups that hit or missed, pipelined
//! batches executed, and the live entry count.

// == Store Stats ==
/// Counters kept by [`MemoryStore`](super::MemoryStore).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of key lookups that found a live value
    pub hits: u64,
    /// Number of key lookups that found nothing (absent or expired)
    pub misses: u64,
    /// Number of pipelined batches executed
    pub pipelines: u64,
    /// Current number of entries, expired-but-unpurged included
    pub total_entries: usize,
}

impl StoreStats {
    // == Constructor ==
    /// Creates a new StoreStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_pipeline(&mut self) {
        self.pipelines += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
