//! API Routes
//!
//! Configures the Axum router with all diagnostic endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, evict_handler, health_handler, lookup_handler, obtain_handler,
    remove_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /obtain` - Serve or fetch an artifact
/// - `GET /entries/:id` - Look up a live entry
/// - `DELETE /entries/:id` - Remove an entry
/// - `POST /evict` - Run an eviction pass
/// - `POST /clear` - Wipe the cache
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
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
        .route("/obtain", post(obtain_handler))
        .route("/entries/:id", get(lookup_handler).delete(remove_handler))
        .route("/evict", post(evict_handler))
        .route("/clear", post(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
