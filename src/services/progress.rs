//! Watch-progress upserts: validation, movie/TV dispatch, and result shaping.
//!
//! The TV merge itself lives in [`crate::services::merge`]; the atomic
//! read-modify-write lives behind [`ProgressStore::merge_tv`].

use crate::{
    db::store::{MovieUpsert, ProgressStore},
    error::{AppError, AppResult},
    models::{MediaType, WatchedProgress, WatchedUpsertRequest},
    services::merge,
};

/// Status value that removes a movie row instead of writing one
const UNWATCHED: &str = "unwatched";

/// Default status written for a tracked movie
const MOVIE_WATCHED: &str = "watched";

/// Outcome of an upsert; the movie delete path is a success even when there
/// was nothing to delete.
#[derive(Debug)]
pub enum UpsertOutcome {
    Updated(WatchedProgress),
    Removed(WatchedProgress),
    NothingTracked,
}

pub async fn list(store: &dyn ProgressStore) -> AppResult<Vec<WatchedProgress>> {
    store.list_progress().await
}

pub async fn get(store: &dyn ProgressStore, imdb_id: &str) -> AppResult<Option<WatchedProgress>> {
    store.get_progress(imdb_id).await
}

pub async fn upsert(
    store: &dyn ProgressStore,
    request: WatchedUpsertRequest,
) -> AppResult<UpsertOutcome> {
    let media_type = validate(&request)?;
    // Checked by validate
    let imdb_id = request.imdb_id.clone().unwrap_or_default();
    let title = request.title.clone().unwrap_or_default();

    match media_type {
        MediaType::Movie => {
            if request.status.as_deref() == Some(UNWATCHED) {
                return match store.delete_movie(&imdb_id).await? {
                    Some(removed) => {
                        tracing::info!(imdb_id = %imdb_id, "Movie removed from watched");
                        Ok(UpsertOutcome::Removed(removed))
                    }
                    None => Ok(UpsertOutcome::NothingTracked),
                };
            }

            let status = request
                .status
                .clone()
                .unwrap_or_else(|| MOVIE_WATCHED.to_string());
            let written = store
                .upsert_movie(&MovieUpsert {
                    imdb_id,
                    title,
                    poster_url: request.poster_url.clone(),
                    status,
                })
                .await?;
            Ok(UpsertOutcome::Updated(written))
        }
        MediaType::Tv => {
            let written = store.merge_tv(&request).await?;
            Ok(UpsertOutcome::Updated(written))
        }
    }
}

fn validate(request: &WatchedUpsertRequest) -> AppResult<MediaType> {
    if request.imdb_id.as_deref().unwrap_or_default().is_empty() {
        return Err(AppError::Validation("imdb_id is required".to_string()));
    }
    if request.title.as_deref().unwrap_or_default().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    let media_type = request
        .media_type
        .as_deref()
        .ok_or_else(|| AppError::Validation("media_type is required".to_string()))?;
    let media_type = MediaType::parse(media_type).ok_or_else(|| {
        AppError::Validation(format!(
            "media_type must be 'movie' or 'tv', got '{}'",
            media_type
        ))
    })?;

    // Reject incomplete toggles up front, before any datastore work.
    merge::episode_toggle(request)?;

    Ok(media_type)
}
