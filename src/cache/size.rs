//! Size Estimation Module
//!
//! Best-effort value sizes for memory accounting.

use std::sync::Arc;

use serde::Serialize;

/// Estimates the size of a value in bytes; `None` means the estimate failed
/// and the engine falls back to its configured default.
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> Option<usize> + Send + Sync>;

/// Length of the value's JSON encoding.
pub fn json_size<V: Serialize>(value: &V) -> Option<usize> {
    serde_json::to_vec(value).ok().map(|bytes| bytes.len())
}

/// Estimator backed by [`json_size`].
pub fn json_estimator<V: Serialize + 'static>() -> SizeEstimator<V> {
    Arc::new(|value: &V| json_size(value))
}
