//! API Module
//!
//! Admin router a host application can mount to inspect and invalidate its
//! cache engines.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /caches` - Names of registered engines
//! - `GET /caches/:name/stats` - Engine statistics
//! - `GET /caches/:name/entries` - Per-entry snapshots
//! - `GET /caches/:name/entries/:key` - Whether a fresh entry exists
//! - `DELETE /caches/:name/entries/:key` - Invalidate a key
//! - `POST /caches/:name/invalidate` - Invalidate by pattern
//! - `POST /caches/:name/purge` - Drop long-expired entries
//! - `DELETE /caches/:name` - Clear an engine

mod admin;
pub mod handlers;
pub mod routes;

pub use admin::CacheAdmin;
pub use handlers::*;
pub use routes::create_router;
