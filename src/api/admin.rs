//! Type-erased admin view of a cache engine.

use regex::Regex;

use crate::cache::{CacheEngine, CacheStats, CacheValue, EntryInfo, FetchError};

/// Operations the admin router can run on any engine, whatever it caches.
pub trait CacheAdmin: Send + Sync {
    fn stats(&self) -> CacheStats;
    fn entries(&self) -> Vec<EntryInfo>;
    fn has(&self, key: &str) -> bool;
    fn invalidate(&self, key: &str) -> bool;
    fn invalidate_pattern(&self, pattern: &Regex) -> usize;
    fn purge_expired(&self) -> usize;
    fn clear(&self);
}

impl<V, E> CacheAdmin for CacheEngine<V, E>
where
    V: CacheValue,
    E: FetchError,
{
    fn stats(&self) -> CacheStats {
        CacheEngine::stats(self)
    }

    fn entries(&self) -> Vec<EntryInfo> {
        CacheEngine::entries(self)
    }

    fn has(&self, key: &str) -> bool {
        CacheEngine::has(self, key)
    }

    fn invalidate(&self, key: &str) -> bool {
        CacheEngine::invalidate(self, key)
    }

    fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        CacheEngine::invalidate_pattern(self, pattern)
    }

    fn purge_expired(&self) -> usize {
        CacheEngine::purge_expired(self)
    }

    fn clear(&self) {
        CacheEngine::clear(self)
    }
}
