//! Data Cache - an in-process async response cache
//!
//! Sits between data-access services and their fetch functions, providing
//! TTL freshness, request coalescing, stale-while-revalidate, auto-refresh
//! subscriptions and LFU eviction bounded by entry count and memory.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState, CacheAdmin};
pub use cache::{CacheEngine, CacheStats, PreloadItem, RefreshStream};
pub use config::{CacheConfig, EngineConfig};
pub use error::{CacheError, SharedError};
pub use tasks::{spawn_cleanup_task, spawn_configured_cleanup};
