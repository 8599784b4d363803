use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use std::collections::HashMap;

use crate::{
    db::store::{FavoritesStore, MovieUpsert, NewFavorite, ProgressStore},
    error::{AppError, AppResult},
    models::{
        Favorite, LastWatchedEpisode, MediaType, WatchedProgress, WatchedUpsertRequest,
    },
    services::merge,
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// PostgreSQL-backed implementation of both store traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct FavoriteRow {
    imdb_id: String,
    title: String,
    poster_url: Option<String>,
    media_type: String,
    added_date: DateTime<Utc>,
}

impl TryFrom<FavoriteRow> for Favorite {
    type Error = AppError;

    fn try_from(row: FavoriteRow) -> AppResult<Self> {
        let media_type = MediaType::parse(&row.media_type).ok_or_else(|| {
            AppError::Internal(format!("unknown media type in favorites row: {}", row.media_type))
        })?;
        Ok(Favorite {
            imdb_id: row.imdb_id,
            title: row.title,
            poster_url: row.poster_url,
            media_type,
            added_date: row.added_date,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProgressRow {
    imdb_id: String,
    media_type: String,
    title: Option<String>,
    poster_url: Option<String>,
    status: String,
    watched_episodes: Json<HashMap<String, bool>>,
    total_seasons: Option<i64>,
    episodes_in_season: Json<HashMap<String, i64>>,
    last_watched_episode: Option<Json<LastWatchedEpisode>>,
    last_interaction_date: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for WatchedProgress {
    type Error = AppError;

    fn try_from(row: ProgressRow) -> AppResult<Self> {
        let media_type = MediaType::parse(&row.media_type).ok_or_else(|| {
            AppError::Internal(format!(
                "unknown media type in watched_progress row: {}",
                row.media_type
            ))
        })?;
        Ok(WatchedProgress {
            imdb_id: row.imdb_id,
            media_type,
            title: row.title,
            poster_url: row.poster_url,
            status: row.status,
            watched_episodes: row.watched_episodes.0,
            total_seasons: row.total_seasons,
            episodes_in_season: row.episodes_in_season.0,
            last_watched_episode: row.last_watched_episode.map(|json| json.0),
            last_interaction_date: row.last_interaction_date,
        })
    }
}

#[async_trait]
impl FavoritesStore for PgStore {
    async fn list_favorites(&self) -> AppResult<Vec<Favorite>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            "SELECT imdb_id, title, poster_url, media_type, added_date
             FROM favorites
             ORDER BY added_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Favorite::try_from).collect()
    }

    async fn insert_favorite(&self, favorite: &NewFavorite) -> AppResult<Option<Favorite>> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            "INSERT INTO favorites (imdb_id, title, poster_url, media_type, added_date)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (imdb_id) DO NOTHING
             RETURNING imdb_id, title, poster_url, media_type, added_date",
        )
        .bind(&favorite.imdb_id)
        .bind(&favorite.title)
        .bind(&favorite.poster_url)
        .bind(favorite.media_type.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Favorite::try_from).transpose()
    }

    async fn find_favorite(&self, imdb_id: &str) -> AppResult<Option<Favorite>> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            "SELECT imdb_id, title, poster_url, media_type, added_date
             FROM favorites
             WHERE imdb_id = $1",
        )
        .bind(imdb_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Favorite::try_from).transpose()
    }

    async fn delete_favorite(&self, imdb_id: &str) -> AppResult<Option<Favorite>> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            "DELETE FROM favorites
             WHERE imdb_id = $1
             RETURNING imdb_id, title, poster_url, media_type, added_date",
        )
        .bind(imdb_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Favorite::try_from).transpose()
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn list_progress(&self) -> AppResult<Vec<WatchedProgress>> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            "SELECT imdb_id, media_type, title, poster_url, status, watched_episodes,
                    total_seasons, episodes_in_season, last_watched_episode, last_interaction_date
             FROM watched_progress
             ORDER BY last_interaction_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WatchedProgress::try_from).collect()
    }

    async fn get_progress(&self, imdb_id: &str) -> AppResult<Option<WatchedProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT imdb_id, media_type, title, poster_url, status, watched_episodes,
                    total_seasons, episodes_in_season, last_watched_episode, last_interaction_date
             FROM watched_progress
             WHERE imdb_id = $1",
        )
        .bind(imdb_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WatchedProgress::try_from).transpose()
    }

    async fn upsert_movie(&self, movie: &MovieUpsert) -> AppResult<WatchedProgress> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "INSERT INTO watched_progress
                 (imdb_id, media_type, title, poster_url, status,
                  watched_episodes, episodes_in_season, last_interaction_date)
             VALUES ($1, 'movie', $2, $3, $4, '{}'::jsonb, '{}'::jsonb, $5)
             ON CONFLICT (imdb_id) DO UPDATE SET
                 title = EXCLUDED.title,
                 poster_url = EXCLUDED.poster_url,
                 status = EXCLUDED.status,
                 last_interaction_date = EXCLUDED.last_interaction_date
             RETURNING imdb_id, media_type, title, poster_url, status, watched_episodes,
                       total_seasons, episodes_in_season, last_watched_episode,
                       last_interaction_date",
        )
        .bind(&movie.imdb_id)
        .bind(&movie.title)
        .bind(&movie.poster_url)
        .bind(&movie.status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => WatchedProgress::try_from(row),
            // The upsert should always return a row; re-read before giving up.
            None => self
                .get_progress(&movie.imdb_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal("watched_progress row missing after movie upsert".to_string())
                }),
        }
    }

    async fn delete_movie(&self, imdb_id: &str) -> AppResult<Option<WatchedProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "DELETE FROM watched_progress
             WHERE imdb_id = $1 AND media_type = 'movie'
             RETURNING imdb_id, media_type, title, poster_url, status, watched_episodes,
                       total_seasons, episodes_in_season, last_watched_episode,
                       last_interaction_date",
        )
        .bind(imdb_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WatchedProgress::try_from).transpose()
    }

    async fn merge_tv(&self, request: &WatchedUpsertRequest) -> AppResult<WatchedProgress> {
        let imdb_id = request
            .imdb_id
            .as_deref()
            .ok_or_else(|| AppError::Validation("imdb_id is required".to_string()))?;

        // Row-locked read-modify-write. Any early return drops `tx`, which
        // rolls the transaction back exactly once.
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, ProgressRow>(
            "SELECT imdb_id, media_type, title, poster_url, status, watched_episodes,
                    total_seasons, episodes_in_season, last_watched_episode, last_interaction_date
             FROM watched_progress
             WHERE imdb_id = $1
             FOR UPDATE",
        )
        .bind(imdb_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(WatchedProgress::try_from)
        .transpose()?;

        let merged = merge::merge_tv(existing.as_ref(), request, Utc::now())?;

        let query = if existing.is_some() {
            "UPDATE watched_progress SET
                 media_type = $2, title = $3, poster_url = $4, status = $5,
                 watched_episodes = $6, total_seasons = $7, episodes_in_season = $8,
                 last_watched_episode = $9, last_interaction_date = $10
             WHERE imdb_id = $1
             RETURNING imdb_id, media_type, title, poster_url, status, watched_episodes,
                       total_seasons, episodes_in_season, last_watched_episode,
                       last_interaction_date"
        } else {
            "INSERT INTO watched_progress
                 (imdb_id, media_type, title, poster_url, status, watched_episodes,
                  total_seasons, episodes_in_season, last_watched_episode, last_interaction_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING imdb_id, media_type, title, poster_url, status, watched_episodes,
                       total_seasons, episodes_in_season, last_watched_episode,
                       last_interaction_date"
        };

        let written = sqlx::query_as::<_, ProgressRow>(query)
            .bind(&merged.imdb_id)
            .bind(merged.media_type.as_str())
            .bind(&merged.title)
            .bind(&merged.poster_url)
            .bind(&merged.status)
            .bind(Json(&merged.watched_episodes))
            .bind(merged.total_seasons)
            .bind(Json(&merged.episodes_in_season))
            .bind(merged.last_watched_episode.as_ref().map(Json))
            .bind(merged.last_interaction_date)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(imdb_id = %merged.imdb_id, status = %merged.status, "TV progress merged");

        match written {
            Some(row) => WatchedProgress::try_from(row),
            None => self.get_progress(imdb_id).await?.ok_or_else(|| {
                AppError::Internal("watched_progress row missing after merge".to_string())
            }),
        }
    }
}
