//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::CacheAdmin;
use crate::error::{CacheError, Result};
use crate::models::{
    CacheListResponse, ClearResponse, EntriesResponse, FreshnessResponse, HealthResponse,
    InvalidatePatternRequest, InvalidatePatternResponse, InvalidateResponse, PurgeResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// Maps a cache name to the engine registered under it.
#[derive(Clone, Default)]
pub struct AppState {
    caches: Arc<BTreeMap<String, Arc<dyn CacheAdmin>>>,
}

impl AppState {
    /// Creates an AppState with no engines registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an engine under `name`, replacing any previous one.
    pub fn register(mut self, name: impl Into<String>, cache: impl CacheAdmin + 'static) -> Self {
        Arc::make_mut(&mut self.caches).insert(name.into(), Arc::new(cache));
        self
    }

    fn cache(&self, name: &str) -> Result<&Arc<dyn CacheAdmin>> {
        self.caches
            .get(name)
            .ok_or_else(|| CacheError::UnknownCache(name.to_string()))
    }
}

/// Handler for GET /caches
pub async fn list_handler(State(state): State<AppState>) -> Json<CacheListResponse> {
    Json(CacheListResponse {
        caches: state.caches.keys().cloned().collect(),
    })
}

/// Handler for GET /caches/:name/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>> {
    let stats = state.cache(&name)?.stats();
    Ok(Json(StatsResponse::new(name, stats)))
}

/// Handler for GET /caches/:name/entries
pub async fn entries_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EntriesResponse>> {
    let entries = state.cache(&name)?.entries();
    Ok(Json(EntriesResponse {
        cache: name,
        entries,
    }))
}

/// Handler for GET /caches/:name/entries/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<FreshnessResponse>> {
    let fresh = state.cache(&name)?.has(&key);
    Ok(Json(FreshnessResponse { key, fresh }))
}

/// Handler for DELETE /caches/:name/entries/:key
///
/// Idempotent: invalidating an absent key still succeeds.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<InvalidateResponse>> {
    let removed = state.cache(&name)?.invalidate(&key);
    Ok(Json(InvalidateResponse::new(key, removed)))
}

/// Handler for POST /caches/:name/invalidate
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<InvalidatePatternRequest>,
) -> Result<Json<InvalidatePatternResponse>> {
    let cache = state.cache(&name)?;
    let pattern = req.compile()?;
    let removed = cache.invalidate_pattern(&pattern);
    Ok(Json(InvalidatePatternResponse::new(req.pattern, removed)))
}

/// Handler for POST /caches/:name/purge
pub async fn purge_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PurgeResponse>> {
    let removed = state.cache(&name)?.purge_expired();
    Ok(Json(PurgeResponse { removed }))
}

/// Handler for DELETE /caches/:name
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>> {
    state.cache(&name)?.clear();
    Ok(Json(ClearResponse::new(&name)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEngine;
    use crate::config::EngineConfig;
    use crate::error::SharedError;

    type Engine = CacheEngine<String, SharedError>;

    async fn seeded_state() -> (AppState, Engine) {
        let engine: Engine = CacheEngine::new(EngineConfig::default());
        for key in ["issues:project:A", "issues:project:B", "issues:backlog:A"] {
            engine
                .get(key, || async { Ok::<_, SharedError>("v".to_string()) })
                .await
                .unwrap();
        }
        let state = AppState::new().register("issues", engine.clone());
        (state, engine)
    }

    #[tokio::test]
    async fn test_list_handler() {
        let (state, _) = seeded_state().await;
        let state = state.register("projects", Engine::new(EngineConfig::default()));

        let response = list_handler(State(state)).await;
        assert_eq!(response.caches, vec!["issues", "projects"]);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = seeded_state().await;

        let response = stats_handler(State(state), Path("issues".to_string()))
            .await
            .unwrap();
        assert_eq!(response.stats.size, 3);
        assert_eq!(response.stats.misses, 3);
    }

    #[tokio::test]
    async fn test_unknown_cache() {
        let (state, _) = seeded_state().await;

        let result = stats_handler(State(state), Path("sprints".to_string())).await;
        assert!(matches!(result, Err(CacheError::UnknownCache(_))));
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let (state, engine) = seeded_state().await;

        let path = Path(("issues".to_string(), "issues:project:A".to_string()));
        let response = invalidate_handler(State(state.clone()), path).await.unwrap();
        assert!(response.removed);
        assert!(!engine.has("issues:project:A"));

        // Second invalidation is a no-op
        let path = Path(("issues".to_string(), "issues:project:A".to_string()));
        let response = invalidate_handler(State(state), path).await.unwrap();
        assert!(!response.removed);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_handler() {
        let (state, engine) = seeded_state().await;

        let req = InvalidatePatternRequest {
            pattern: "issues:project:".to_string(),
        };
        let response =
            invalidate_pattern_handler(State(state), Path("issues".to_string()), Json(req))
                .await
                .unwrap();

        assert_eq!(response.removed, 2);
        assert_eq!(engine.stats().keys, vec!["issues:backlog:A".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let (state, engine) = seeded_state().await;

        clear_handler(State(state), Path("issues".to_string()))
            .await
            .unwrap();
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
