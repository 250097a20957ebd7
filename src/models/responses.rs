//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, EntryInfo};

/// Response body for GET /caches
#[derive(Debug, Clone, Serialize)]
pub struct CacheListResponse {
    /// Names of all registered engines, sorted
    pub caches: Vec<String>,
}

/// Response body for GET /caches/:name/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Engine name
    pub cache: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Share of lookups served from stored values
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(cache: impl Into<String>, stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            cache: cache.into(),
            stats,
            hit_rate,
        }
    }
}

/// Response body for GET /caches/:name/entries
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub cache: String,
    pub entries: Vec<EntryInfo>,
}

/// Response body for GET /caches/:name/entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct FreshnessResponse {
    pub key: String,
    /// True iff a fresh entry exists
    pub fresh: bool,
}

/// Response body for DELETE /caches/:name/entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Success message
    pub message: String,
    /// The key that was invalidated
    pub key: String,
    /// Whether an entry or in-flight fetch existed
    pub removed: bool,
}

impl InvalidateResponse {
    pub fn new(key: impl Into<String>, removed: bool) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' invalidated", key),
            key,
            removed,
        }
    }
}

/// Response body for POST /caches/:name/invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidatePatternResponse {
    pub message: String,
    pub pattern: String,
    /// Number of entries removed
    pub removed: usize,
}

impl InvalidatePatternResponse {
    pub fn new(pattern: impl Into<String>, removed: usize) -> Self {
        let pattern = pattern.into();
        Self {
            message: format!("Removed {} entries matching '{}'", removed, pattern),
            pattern,
            removed,
        }
    }
}

/// Response body for POST /caches/:name/purge
#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    /// Number of expired entries removed
    pub removed: usize,
}

/// Response body for DELETE /caches/:name
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new(cache: &str) -> Self {
        Self {
            message: format!("Cache '{}' cleared", cache),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
