//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside an engine.
//!
//! # Tasks
//! - Sweeper: removes entries that have been expired longer than the stale retention

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_configured_cleanup};
