//! API Routes
//!
//! Configures the Axum router with all cache admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, entries_handler, has_handler, health_handler, invalidate_handler,
    invalidate_pattern_handler, list_handler, purge_handler, stats_handler, AppState,
};

/// Creates the admin router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /caches` - Names of registered engines
/// - `GET /caches/:name/stats` - Engine statistics
/// - `GET /caches/:name/entries` - Per-entry snapshots
/// - `GET /caches/:name/entries/:key` - Whether a fresh entry exists
/// - `DELETE /caches/:name/entries/:key` - Invalidate one key
/// - `POST /caches/:name/invalidate` - Invalidate keys matching a regex
/// - `POST /caches/:name/purge` - Drop long-expired entries
/// - `DELETE /caches/:name` - Clear the engine
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/caches", get(list_handler))
        .route("/caches/:name", delete(clear_handler))
        .route("/caches/:name/stats", get(stats_handler))
        .route("/caches/:name/entries", get(entries_handler))
        .route(
            "/caches/:name/entries/:key",
            get(has_handler).delete(invalidate_handler),
        )
        .route("/caches/:name/invalidate", post(invalidate_pattern_handler))
        .route("/caches/:name/purge", post(purge_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
