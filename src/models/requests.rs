//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use regex::Regex;
use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Request body for pattern invalidation (POST /caches/:name/invalidate)
///
/// # Fields
/// - `pattern`: Regular expression matched against cache keys
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidatePatternRequest {
    /// Regular expression over cache keys
    pub pattern: String,
}

impl InvalidatePatternRequest {
    /// Compiles the pattern, rejecting empty or malformed expressions.
    pub fn compile(&self) -> Result<Regex> {
        if self.pattern.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Pattern cannot be empty".to_string(),
            ));
        }
        Regex::new(&self.pattern).map_err(|err| CacheError::InvalidPattern(err.to_string()))
    }
}
