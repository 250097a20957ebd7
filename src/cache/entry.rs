//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and hit tracking.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Far-future fallback when `created_at + ttl` overflows the clock
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// == Cache Entry ==
/// Represents a single cached value with freshness and eviction metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Monotonic creation time
    pub created_at: Instant,
    /// Entry is fresh while `now < expires_at`
    pub expires_at: Instant,
    /// Wall-clock creation time, for reporting only
    pub stored_at: DateTime<Utc>,
    /// Fresh reads plus one; eviction priority (lower goes first)
    pub hit_count: u64,
    /// Estimated size of `value` in bytes
    pub size_bytes: usize,
    /// Insertion sequence number, breaks `created_at` ties deterministically
    pub seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stored now.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - How long the value stays fresh
    /// * `size_bytes` - Estimated size used for memory accounting
    /// * `seq` - Insertion sequence number
    pub fn new(value: V, ttl: Duration, size_bytes: usize, seq: u64) -> Self {
        Self::new_at(value, ttl, size_bytes, seq, Instant::now())
    }

    /// Creates a new entry as if stored at `now`.
    pub fn new_at(value: V, ttl: Duration, size_bytes: usize, seq: u64, now: Instant) -> Self {
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + MAX_TTL);

        Self {
            value,
            created_at: now,
            expires_at,
            stored_at: Utc::now(),
            hit_count: 1,
            size_bytes,
            seq,
        }
    }

    // == Freshness ==
    /// Returns true while the TTL has not fully elapsed.
    ///
    /// Boundary condition: at exactly `expires_at` the entry is already stale.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// Returns true once `now >= expires_at + grace`.
    pub fn is_expired_beyond(&self, now: Instant, grace: Duration) -> bool {
        !self.is_fresh(now) && now.saturating_duration_since(self.expires_at) >= grace
    }

    /// Remaining time until the entry goes stale, zero once expired.
    pub fn ttl_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    // == Record Hit ==
    /// Counts a fresh read.
    pub fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }

    /// Point-in-time description of this entry.
    pub fn info(&self, key: &str, now: Instant) -> EntryInfo {
        EntryInfo {
            key: key.to_string(),
            hit_count: self.hit_count,
            size_bytes: self.size_bytes,
            fresh: self.is_fresh(now),
            ttl_remaining_ms: self.ttl_remaining(now).as_millis() as u64,
            stored_at: self.stored_at,
        }
    }
}

// == Entry Info ==
/// Serializable snapshot of one entry, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub hit_count: u64,
    pub size_bytes: usize,
    pub fresh: bool,
    pub ttl_remaining_ms: u64,
    pub stored_at: DateTime<Utc>,
}
