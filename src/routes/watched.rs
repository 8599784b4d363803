use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{WatchedProgress, WatchedUpsertRequest},
    routes::AppState,
    services::progress::{self, UpsertOutcome},
};

/// Handler for listing all watched-progress records
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<WatchedProgress>>> {
    let all = progress::list(state.progress.as_ref()).await?;
    Ok(Json(all))
}

/// Handler for fetching one record; an untracked id yields `{}` rather than 404
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(imdb_id): Path<String>,
) -> AppResult<Json<Value>> {
    match progress::get(state.progress.as_ref(), &imdb_id).await? {
        Some(row) => Ok(Json(to_json(row)?)),
        None => Ok(Json(json!({}))),
    }
}

/// Handler for the progress upsert
pub async fn upsert(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<WatchedUpsertRequest>,
) -> AppResult<Json<Value>> {
    tracing::info!(
        request_id = %request_id,
        imdb_id = request.imdb_id.as_deref().unwrap_or("?"),
        media_type = request.media_type.as_deref().unwrap_or("?"),
        "Processing watched upsert"
    );

    match progress::upsert(state.progress.as_ref(), request).await? {
        UpsertOutcome::Updated(row) | UpsertOutcome::Removed(row) => Ok(Json(to_json(row)?)),
        UpsertOutcome::NothingTracked => Ok(Json(json!({}))),
    }
}

fn to_json(row: WatchedProgress) -> AppResult<Value> {
    serde_json::to_value(row).map_err(|e| AppError::Internal(e.to_string()))
}
