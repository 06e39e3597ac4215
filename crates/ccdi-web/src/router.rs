//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    entities::{count_by_field, invalid_route, list, show, summary},
    health::health,
};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(health))

        // Entity API
        .route("/api/v1/{entity}",                    get(list))
        .route("/api/v1/{entity}/summary",            get(summary))
        .route("/api/v1/{entity}/by/{field}/count",   get(count_by_field))
        .route("/api/v1/{entity}/{org}/{ns}/{name}",  get(show))
        .fallback(invalid_route)

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
