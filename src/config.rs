//! Configuration Module
//!
//! Per-call cache configuration and engine-wide defaults loaded from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

// == Defaults ==
/// Default time-to-live for cached values (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// Default memory budget in bytes (50 MiB)
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 50 * 1024 * 1024;

/// Size assumed for a value whose size cannot be estimated
pub const DEFAULT_FALLBACK_ENTRY_SIZE: usize = 1024;

/// How long an expired entry is kept around for stale reads before the
/// sweeper drops it
pub const DEFAULT_STALE_RETENTION: Duration = Duration::from_millis(300_000);

// == Cache Config ==
/// Configuration applied to a single `get` call.
///
/// Eviction bounds are evaluated with the config of the call that stored the
/// value, so callers sharing an engine should agree on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a stored value stays fresh
    pub ttl: Duration,
    /// Entry-count bound checked after every store
    pub max_entries: usize,
    /// Memory bound (sum of estimated sizes) checked after every store
    pub max_memory_bytes: usize,
    /// Serve expired values immediately while refetching in the background
    pub stale_while_revalidate: bool,
    /// Period of the auto-refresh timer, None disables it
    pub refresh_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            stale_while_revalidate: false,
            refresh_interval: None,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_memory_bytes(mut self, max_memory_bytes: usize) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

// == Engine Config ==
/// Engine-wide configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Config used by calls that do not pass their own
    pub defaults: CacheConfig,
    /// Interval of the expired-entry sweeper, None = no sweeper
    pub cleanup_interval: Option<Duration>,
    /// Grace period after expiry before the sweeper removes an entry
    pub stale_retention: Duration,
    /// Size recorded when the size estimator fails
    pub fallback_entry_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: CacheConfig::default(),
            cleanup_interval: None,
            stale_retention: DEFAULT_STALE_RETENTION,
            fallback_entry_size: DEFAULT_FALLBACK_ENTRY_SIZE,
        }
    }
}

impl EngineConfig {
    /// Creates a new EngineConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 200)
    /// - `CACHE_MAX_MEMORY_BYTES` - Memory budget (default: 52428800)
    /// - `CACHE_STALE_WHILE_REVALIDATE` - `true`/`false` (default: false)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweeper interval, unset = disabled
    /// - `CACHE_STALE_RETENTION_MS` - Grace period before sweeping (default: 300000)
    /// - `CACHE_FALLBACK_ENTRY_SIZE` - Size used when estimation fails (default: 1024)
    pub fn from_env() -> Self {
        let defaults = CacheConfig {
            ttl: env_parse::<u64>("CACHE_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TTL),
            max_entries: env_parse("CACHE_MAX_ENTRIES").unwrap_or(DEFAULT_MAX_ENTRIES),
            max_memory_bytes: env_parse("CACHE_MAX_MEMORY_BYTES")
                .unwrap_or(DEFAULT_MAX_MEMORY_BYTES),
            stale_while_revalidate: env_parse("CACHE_STALE_WHILE_REVALIDATE").unwrap_or(false),
            refresh_interval: None,
        };

        Self {
            defaults,
            cleanup_interval: env_parse::<u64>("CACHE_CLEANUP_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            stale_retention: env_parse::<u64>("CACHE_STALE_RETENTION_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STALE_RETENTION),
            fallback_entry_size: env_parse("CACHE_FALLBACK_ENTRY_SIZE")
                .unwrap_or(DEFAULT_FALLBACK_ENTRY_SIZE),
        }
    }

    /// Rejects bounds that would make every store evict immediately.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.ttl.is_zero() {
            return Err(CacheError::InvalidConfig("ttl must be positive".to_string()));
        }
        if self.defaults.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if self.defaults.max_memory_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "max_memory_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
