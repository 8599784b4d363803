use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::{FavoritesStore, PgStore, ProgressStore},
    middleware::request_id::request_id_middleware,
};

pub mod favorites;
pub mod watched;

/// Shared application state: the two storage seams behind trait objects so
/// tests can substitute an in-memory store.
#[derive(Clone)]
pub struct AppState {
    pub favorites: Arc<dyn FavoritesStore>,
    pub progress: Arc<dyn ProgressStore>,
}

impl AppState {
    pub fn new(favorites: Arc<dyn FavoritesStore>, progress: Arc<dyn ProgressStore>) -> Self {
        Self { favorites, progress }
    }

    /// Wires both seams to one PostgreSQL-backed store
    pub fn with_postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            favorites: store.clone(),
            progress: store,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/favorites",
            get(favorites::list).post(favorites::create),
        )
        .route("/api/favorites/:imdb_id", delete(favorites::remove))
        .route("/api/watched", get(watched::list).post(watched::upsert))
        .route("/api/watched/:imdb_id", get(watched::get_by_id))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
