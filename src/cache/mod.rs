//! Cache Module
//!
//! In-memory keyed response cache with TTL freshness, request coalescing,
//! stale-while-revalidate and LFU eviction.

mod engine;
mod entry;
mod lfu;
mod refresh;
mod size;
mod stats;


// Re-export public types
pub use engine::{CacheEngine, CacheValue, FetchError, PreloadItem};
pub use entry::{CacheEntry, EntryInfo};
pub use lfu::LfuPolicy;
pub use refresh::RefreshStream;
pub use size::{json_estimator, json_size, SizeEstimator};
pub use stats::CacheStats;
