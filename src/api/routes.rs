use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Credential submission
        .route("/api/keys", post(handlers::store_keys))
        // Per-user catalogs
        .route(
            "/:user_id/catalog/:media_type/search/:query",
            get(handlers::search_catalog),
        )
        .route(
            "/:user_id/catalog/:media_type/recent",
            get(handlers::recent_catalog),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
