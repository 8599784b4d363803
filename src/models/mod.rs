use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Media kind tracked by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Parses a client-submitted media type string
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Tv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical TV watch statuses
///
/// Consumed by both request validation and default resolution; the enumeration
/// lives here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Watching,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
}

impl WatchStatus {
    pub const ALL: [WatchStatus; 5] = [
        WatchStatus::Watching,
        WatchStatus::Completed,
        WatchStatus::OnHold,
        WatchStatus::Dropped,
        WatchStatus::PlanToWatch,
    ];

    /// Parses a status string against the canonical enumeration
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Watching => "watching",
            WatchStatus::Completed => "completed",
            WatchStatus::OnHold => "on_hold",
            WatchStatus::Dropped => "dropped",
            WatchStatus::PlanToWatch => "plan_to_watch",
        }
    }
}

// ============================================================================
// Persisted entities
// ============================================================================

/// A bookmarked title, independent of watch state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Favorite {
    pub imdb_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub media_type: MediaType,
    pub added_date: DateTime<Utc>,
}

/// The most recently toggled-on episode of a TV show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastWatchedEpisode {
    pub season: i64,
    pub episode: i64,
    pub timestamp: DateTime<Utc>,
}

/// Per-title consumption state: binary for movies, per-episode map for TV
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedProgress {
    pub imdb_id: String,
    pub media_type: MediaType,
    pub title: Option<String>,
    pub poster_url: Option<String>,
    pub status: String,
    pub watched_episodes: HashMap<String, bool>,
    pub total_seasons: Option<i64>,
    pub episodes_in_season: HashMap<String, i64>,
    pub last_watched_episode: Option<LastWatchedEpisode>,
    pub last_interaction_date: DateTime<Utc>,
}

// ============================================================================
// Request types
// ============================================================================
//
// Bodies are deserialized permissively (every field optional) so that missing
// or malformed fields surface as this API's validation errors rather than as
// framework-level rejections.

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFavoriteRequest {
    pub imdb_id: Option<String>,
    pub title: Option<String>,
    pub poster_url: Option<String>,
    pub media_type: Option<String>,
}

/// A single episode toggle within an upsert request
///
/// All fields optional at the wire level; the service rejects the request if
/// any of them is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeToggle {
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub watched: Option<bool>,
}

/// Partial update for a watched-progress record
///
/// `total_seasons` and `episodes_in_season` counts arrive as raw JSON values
/// because clients send both numbers and numeric strings; the merge engine
/// coerces them and drops anything non-numeric.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchedUpsertRequest {
    pub imdb_id: Option<String>,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub poster_url: Option<String>,
    pub status: Option<String>,
    pub watched_episode: Option<EpisodeToggle>,
    pub total_seasons: Option<serde_json::Value>,
    pub episodes_in_season: Option<HashMap<String, serde_json::Value>>,
    /// Full-object override: replaces the persisted episode map wholesale,
    /// including the empty-map reset.
    pub watched_episodes: Option<HashMap<String, bool>>,
    /// Full-object override; an explicit `null` resets the field, which is why
    /// absence and null must be told apart.
    #[serde(default, deserialize_with = "double_option")]
    pub last_watched_episode: Option<Option<LastWatchedEpisode>>,
}

/// Deserializes a field into `Some(inner)` whenever it is present, so that
/// `Some(None)` means "explicit null" and `None` means "absent".
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_parses_known_values_only() {
        assert_eq!(MediaType::parse("movie"), Some(MediaType::Movie));
        assert_eq!(MediaType::parse("tv"), Some(MediaType::Tv));
        assert_eq!(MediaType::parse("book"), None);
        assert_eq!(MediaType::parse(""), None);
    }

    #[test]
    fn watch_status_round_trips_through_strings() {
        for status in WatchStatus::ALL {
            assert_eq!(WatchStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WatchStatus::parse("unwatched"), None);
        assert_eq!(WatchStatus::parse("WATCHING"), None);
    }

    #[test]
    fn last_watched_override_distinguishes_null_from_absent() {
        let absent: WatchedUpsertRequest = serde_json::from_str("{}").unwrap();
        assert!(absent.last_watched_episode.is_none());

        let null: WatchedUpsertRequest =
            serde_json::from_str(r#"{"last_watched_episode": null}"#).unwrap();
        assert_eq!(null.last_watched_episode, Some(None));

        let set: WatchedUpsertRequest = serde_json::from_str(
            r#"{"last_watched_episode": {"season": 2, "episode": 5, "timestamp": "2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        let inner = set.last_watched_episode.unwrap().unwrap();
        assert_eq!(inner.season, 2);
        assert_eq!(inner.episode, 5);
    }
}
