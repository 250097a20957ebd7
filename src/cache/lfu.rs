//! LFU Policy Module
//!
//! Picks eviction victims by ascending hit count, oldest first on ties.

use std::collections::HashMap;

use crate::cache::CacheEntry;

// == LFU Policy ==
/// Least-frequently-used eviction over an entry-count and a memory bound.
///
/// Victims are ordered by `(hit_count, created_at, seq)`. The same order is
/// used for both bounds, so entry-count removals come first and the memory
/// bound continues from wherever they stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfuPolicy {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Maximum sum of entry sizes in bytes
    pub max_memory_bytes: usize,
}

impl LfuPolicy {
    // == Constructor ==
    pub fn new(max_entries: usize, max_memory_bytes: usize) -> Self {
        Self {
            max_entries,
            max_memory_bytes,
        }
    }

    // == Select Victims ==
    /// Returns the keys to remove so that both bounds hold again.
    ///
    /// `protected` (the entry just stored) is never selected. When the bounds
    /// cannot be met without it, the over-limit state is accepted.
    pub fn select_victims<V>(
        &self,
        entries: &HashMap<String, CacheEntry<V>>,
        protected: Option<&str>,
    ) -> Vec<String> {
        let mut count = entries.len();
        let mut memory: usize = entries.values().map(|e| e.size_bytes).sum();

        if count <= self.max_entries && memory <= self.max_memory_bytes {
            return Vec::new();
        }

        let mut ordered: Vec<(&String, &CacheEntry<V>)> = entries
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != protected)
            .collect();
        ordered.sort_by(|(_, a), (_, b)| {
            a.hit_count
                .cmp(&b.hit_count)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.seq.cmp(&b.seq))
        });

        let mut candidates = ordered.into_iter();
        let mut victims = Vec::new();

        // Entry-count bound
        while count > self.max_entries {
            let Some((key, entry)) = candidates.next() else {
                return victims;
            };
            count -= 1;
            memory = memory.saturating_sub(entry.size_bytes);
            victims.push(key.clone());
        }

        // Memory bound
        while memory > self.max_memory_bytes {
            let Some((key, entry)) = candidates.next() else {
                break;
            };
            memory = memory.saturating_sub(entry.size_bytes);
            victims.push(key.clone());
        }

        victims
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        entries: HashMap<String, CacheEntry<&'static str>>,
        base: Instant,
        seq: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                entries: HashMap::new(),
                base: Instant::now(),
                seq: 0,
            }
        }

        fn insert(&mut self, key: &str, hits: u64, size: usize) {
            self.seq += 1;
            let created = self.base + Duration::from_millis(self.seq);
            let mut entry =
                CacheEntry::new_at("v", Duration::from_secs(60), size, self.seq, created);
            entry.hit_count = hits;
            self.entries.insert(key.to_string(), entry);
        }
    }

    #[test]
    fn test_within_bounds_selects_nothing() {
        let mut f = Fixture::new();
        f.insert("a", 1, 10);
        f.insert("b", 1, 10);

        let policy = LfuPolicy::new(2, 100);
        assert!(policy.select_victims(&f.entries, None).is_empty());
    }

    #[test]
    fn test_entry_bound_evicts_lowest_hits() {
        let mut f = Fixture::new();
        f.insert("a", 5, 1);
        f.insert("b", 2, 1);
        f.insert("c", 9, 1);
        f.insert("d", 1, 1);

        let policy = LfuPolicy::new(2, 1000);
        assert_eq!(policy.select_victims(&f.entries, None), vec!["d", "b"]);
    }

    #[test]
    fn test_ties_evict_oldest_first() {
        let mut f = Fixture::new();
        f.insert("first", 1, 1);
        f.insert("second", 1, 1);
        f.insert("third", 1, 1);

        let policy = LfuPolicy::new(1, 1000);
        assert_eq!(
            policy.select_victims(&f.entries, None),
            vec!["first", "second"]
        );
    }

    #[test]
    fn test_memory_bound_evicts_until_within_budget() {
        let mut f = Fixture::new();
        f.insert("small", 1, 10);
        f.insert("big", 2, 60);
        f.insert("hot", 10, 40);

        // 110 bytes against a 50 byte budget
        let policy = LfuPolicy::new(10, 50);
        assert_eq!(policy.select_victims(&f.entries, None), vec!["small", "big"]);
    }

    #[test]
    fn test_both_bounds_in_one_cycle() {
        let mut f = Fixture::new();
        f.insert("a", 1, 30);
        f.insert("b", 2, 30);
        f.insert("c", 3, 30);
        f.insert("d", 4, 30);

        // Entry bound removes "a"; 90 bytes still exceeds 60 so "b" goes too
        let policy = LfuPolicy::new(3, 60);
        assert_eq!(policy.select_victims(&f.entries, None), vec!["a", "b"]);
    }

    #[test]
    fn test_protected_entry_is_skipped() {
        let mut f = Fixture::new();
        f.insert("old", 3, 1);
        f.insert("new", 1, 1);

        let policy = LfuPolicy::new(1, 1000);
        assert_eq!(policy.select_victims(&f.entries, Some("new")), vec!["old"]);
    }

    #[test]
    fn test_oversized_protected_entry_is_accepted() {
        let mut f = Fixture::new();
        f.insert("huge", 1, 500);

        let policy = LfuPolicy::new(10, 100);
        assert!(policy.select_victims(&f.entries, Some("huge")).is_empty());
    }
}
