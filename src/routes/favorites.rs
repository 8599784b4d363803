use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{CreateFavoriteRequest, Favorite},
    routes::AppState,
    services::favorites::{self, CreateOutcome},
};

/// Handler for listing favorites, newest first
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Favorite>>> {
    let all = favorites::list(state.favorites.as_ref()).await?;
    Ok(Json(all))
}

/// Handler for adding a favorite; replays of an existing id return the stored
/// row with 200 instead of 201
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateFavoriteRequest>,
) -> AppResult<(StatusCode, Json<Favorite>)> {
    match favorites::create(state.favorites.as_ref(), request).await? {
        CreateOutcome::Created(favorite) => Ok((StatusCode::CREATED, Json(favorite))),
        CreateOutcome::AlreadyExists(favorite) => Ok((StatusCode::OK, Json(favorite))),
    }
}

/// Handler for removing a favorite by id
pub async fn remove(
    State(state): State<AppState>,
    Path(imdb_id): Path<String>,
) -> AppResult<Json<Favorite>> {
    let removed = favorites::remove(state.favorites.as_ref(), &imdb_id).await?;
    Ok(Json(removed))
}
