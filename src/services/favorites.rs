//! Favorites: plain create/read/delete, no merge logic.

use crate::{
    db::store::{FavoritesStore, NewFavorite},
    error::{AppError, AppResult},
    models::{CreateFavoriteRequest, Favorite, MediaType},
};

/// Outcome of a create call; an existing row is returned as-is rather than
/// treated as an error.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Favorite),
    AlreadyExists(Favorite),
}

pub async fn list(store: &dyn FavoritesStore) -> AppResult<Vec<Favorite>> {
    store.list_favorites().await
}

pub async fn create(
    store: &dyn FavoritesStore,
    request: CreateFavoriteRequest,
) -> AppResult<CreateOutcome> {
    let favorite = validate(request)?;

    if let Some(created) = store.insert_favorite(&favorite).await? {
        tracing::info!(imdb_id = %created.imdb_id, "Favorite added");
        return Ok(CreateOutcome::Created(created));
    }

    // Unique-key conflict: the row should already be there. If it is not,
    // a concurrent delete won the race and the client has to retry.
    match store.find_favorite(&favorite.imdb_id).await? {
        Some(existing) => Ok(CreateOutcome::AlreadyExists(existing)),
        None => Err(AppError::Conflict(format!(
            "favorite {} could not be created or found",
            favorite.imdb_id
        ))),
    }
}

pub async fn remove(store: &dyn FavoritesStore, imdb_id: &str) -> AppResult<Favorite> {
    match store.delete_favorite(imdb_id).await? {
        Some(removed) => {
            tracing::info!(imdb_id = %imdb_id, "Favorite removed");
            Ok(removed)
        }
        None => Err(AppError::NotFound(format!("favorite {} not found", imdb_id))),
    }
}

fn validate(request: CreateFavoriteRequest) -> AppResult<NewFavorite> {
    let imdb_id = request
        .imdb_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("imdb_id is required".to_string()))?;
    let title = request
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("title is required".to_string()))?;
    let media_type = request
        .media_type
        .ok_or_else(|| AppError::Validation("media_type is required".to_string()))?;
    let media_type = MediaType::parse(&media_type).ok_or_else(|| {
        AppError::Validation(format!("media_type must be 'movie' or 'tv', got '{}'", media_type))
    })?;

    Ok(NewFavorite {
        imdb_id,
        title,
        poster_url: request.poster_url,
        media_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> CreateFavoriteRequest {
        CreateFavoriteRequest {
            imdb_id: Some("tt0903747".to_string()),
            title: Some("Breaking Bad".to_string()),
            poster_url: None,
            media_type: Some("tv".to_string()),
        }
    }

    #[test]
    fn validate_accepts_a_complete_request() {
        let favorite = validate(full_request()).unwrap();
        assert_eq!(favorite.imdb_id, "tt0903747");
        assert_eq!(favorite.media_type, MediaType::Tv);
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let strips: [fn(&mut CreateFavoriteRequest); 3] = [
            |r| r.imdb_id = None,
            |r| r.title = None,
            |r| r.media_type = None,
        ];
        for strip in strips {
            let mut request = full_request();
            strip(&mut request);
            assert!(matches!(validate(request), Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn validate_rejects_unknown_media_type() {
        let mut request = full_request();
        request.media_type = Some("podcast".to_string());
        assert!(matches!(validate(request), Err(AppError::Validation(_))));
    }
}
