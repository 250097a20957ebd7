//! Cache Statistics Module
//!
//! Tracks lookup outcomes and evictions, and carries the point-in-time view
//! of the engine returned by `CacheEngine::stats`.

use serde::Serialize;

// == Cache Stats ==
/// Cache counters plus a snapshot of the current contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Keys of all current entries, sorted
    pub keys: Vec<String>,
    /// Fetches currently executing
    pub in_flight_count: usize,
    /// Sum of estimated entry sizes in bytes
    pub memory_bytes: usize,
    /// Keys with an active auto-refresh subscription
    pub auto_refresh_count: usize,
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that started a new fetch
    pub misses: u64,
    /// Lookups answered from an expired entry while revalidating
    pub stale_hits: u64,
    /// Lookups that joined a fetch already in flight
    pub coalesced: u64,
    /// Entries removed by the LFU policy
    pub evictions: u64,
    /// Fetches that settled with an error
    pub fetch_failures: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of lookups served without waiting on a fetch.
    ///
    /// Stale hits count as served; returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses + self.coalesced;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_stale_hit(&mut self) {
        self.stale_hits += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_fetch_failure(&mut self) {
        self.fetch_failures += 1;
    }
}
