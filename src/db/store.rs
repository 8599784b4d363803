use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Favorite, MediaType, WatchedProgress, WatchedUpsertRequest},
};

/// A validated favorite ready for insertion
#[derive(Debug, Clone)]
pub struct NewFavorite {
    pub imdb_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub media_type: MediaType,
}

/// A validated movie progress write (the movie path never merges)
#[derive(Debug, Clone)]
pub struct MovieUpsert {
    pub imdb_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub status: String,
}

/// Persistence seam for the favorites table
#[async_trait]
pub trait FavoritesStore: Send + Sync {
    /// All favorites, newest first
    async fn list_favorites(&self) -> AppResult<Vec<Favorite>>;

    /// Inserts unless the id is already present; returns `None` on conflict
    async fn insert_favorite(&self, favorite: &NewFavorite) -> AppResult<Option<Favorite>>;

    async fn find_favorite(&self, imdb_id: &str) -> AppResult<Option<Favorite>>;

    /// Deletes by id, returning the removed row if one matched
    async fn delete_favorite(&self, imdb_id: &str) -> AppResult<Option<Favorite>>;
}

/// Persistence seam for the watched-progress table
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn list_progress(&self) -> AppResult<Vec<WatchedProgress>>;

    async fn get_progress(&self, imdb_id: &str) -> AppResult<Option<WatchedProgress>>;

    /// Idempotent insert-or-update of a movie row
    async fn upsert_movie(&self, movie: &MovieUpsert) -> AppResult<WatchedProgress>;

    /// Removes a movie row, returning it if one existed
    async fn delete_movie(&self, imdb_id: &str) -> AppResult<Option<WatchedProgress>>;

    /// Atomic read-modify-write of a TV row via the merge engine.
    ///
    /// Implementations must make the whole sequence atomic with respect to
    /// concurrent merges for the same id; readers never observe partial state.
    async fn merge_tv(&self, request: &WatchedUpsertRequest) -> AppResult<WatchedProgress>;
}
