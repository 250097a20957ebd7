//! Error types for the cache engine
//!
//! Fetch failures are never wrapped: a fetcher's error type `E` reaches every
//! waiter unchanged. `CacheError` only covers failures the engine raises on
//! its own, and is lifted into `E` through `From<CacheError>`.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised by the engine itself or by the admin router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Cache keys must be non-empty
    #[error("Cache key must not be empty")]
    EmptyKey,

    /// The fetcher panicked while producing a value
    #[error("Fetch for key '{0}' panicked")]
    FetchPanicked(String),

    /// The fetch task was aborted before it settled (runtime shutdown)
    #[error("Fetch for key '{0}' was aborted")]
    FetchAborted(String),

    /// Invalidation pattern is not a valid regular expression
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// No engine registered under this name
    #[error("Unknown cache: {0}")]
    UnknownCache(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Engine configuration out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::UnknownCache(_) => StatusCode::NOT_FOUND,
            CacheError::EmptyKey
            | CacheError::InvalidPattern(_)
            | CacheError::InvalidRequest(_)
            | CacheError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            CacheError::FetchPanicked(_) | CacheError::FetchAborted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Shared Error ==
/// Clonable error for fetchers that work with `anyhow`.
///
/// Coalesced waiters all receive the same failure, so fetch errors must be
/// `Clone`.
pub type SharedError = Arc<anyhow::Error>;

impl From<CacheError> for SharedError {
    fn from(err: CacheError) -> Self {
        Arc::new(anyhow::Error::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for engine-level operations.
pub type Result<T> = std::result::Result<T, CacheError>;
