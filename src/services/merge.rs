//! Pure merge logic for TV watch progress.
//!
//! Everything here is a function of `(existing row, request, now)` with no I/O,
//! so the coalesce chains and status resolution are testable without a
//! database. The persistence layer wraps [`merge_tv`] in a row-locked
//! transaction.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{LastWatchedEpisode, MediaType, WatchStatus, WatchedProgress, WatchedUpsertRequest},
};

/// Builds the canonical episode key, e.g. `S1E3`
pub fn episode_key(season: i64, episode: i64) -> String {
    format!("S{}E{}", season, episode)
}

/// A fully-specified episode toggle extracted from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub season: i64,
    pub episode: i64,
    pub watched: bool,
}

/// Extracts and validates the episode toggle, if the request carries one
pub fn episode_toggle(request: &WatchedUpsertRequest) -> AppResult<Option<Toggle>> {
    let Some(toggle) = &request.watched_episode else {
        return Ok(None);
    };

    match (toggle.season, toggle.episode, toggle.watched) {
        (Some(season), Some(episode), Some(watched)) => Ok(Some(Toggle {
            season,
            episode,
            watched,
        })),
        _ => Err(AppError::Validation(
            "watched_episode requires season, episode and watched".to_string(),
        )),
    }
}

/// Resolves the final status: request value if valid, else the persisted value
/// if valid, else the default.
///
/// An empty status enumeration cannot happen with the enum as defined; if it
/// ever does, that is an invariant violation worth aborting on rather than
/// persisting garbage.
pub fn resolve_status(requested: Option<&str>, existing: Option<&str>) -> AppResult<&'static str> {
    if let Some(status) = requested.and_then(WatchStatus::parse) {
        return Ok(status.as_str());
    }
    if let Some(status) = existing.and_then(WatchStatus::parse) {
        return Ok(status.as_str());
    }

    WatchStatus::ALL
        .iter()
        .copied()
        .find(|s| *s == WatchStatus::Watching)
        .or_else(|| WatchStatus::ALL.first().copied())
        .map(|s| s.as_str())
        .ok_or_else(|| AppError::Internal("watch status enumeration is empty".to_string()))
}

/// Coerces a client-submitted count into a non-negative integer.
///
/// Accepts JSON numbers and numeric strings; anything else (or a negative
/// value) is rejected as `None`.
pub fn coerce_count(value: &serde_json::Value) -> Option<i64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.filter(|n| *n >= 0)
}

/// Computes the new canonical TV progress row from the persisted row (if any)
/// and a partial update request.
///
/// Ordering is reset-then-toggle: a bulk `watched_episodes` or
/// `last_watched_episode` override replaces the base state first, and a
/// per-episode toggle in the same request applies on top of the result.
pub fn merge_tv(
    existing: Option<&WatchedProgress>,
    request: &WatchedUpsertRequest,
    now: DateTime<Utc>,
) -> AppResult<WatchedProgress> {
    let imdb_id = request
        .imdb_id
        .clone()
        .ok_or_else(|| AppError::Validation("imdb_id is required".to_string()))?;
    let toggle = episode_toggle(request)?;

    let title = request
        .title
        .as_deref()
        .or_else(|| existing.and_then(|row| row.title.as_deref()))
        .map(str::to_owned);
    let poster_url = request
        .poster_url
        .as_deref()
        .or_else(|| existing.and_then(|row| row.poster_url.as_deref()))
        .map(str::to_owned);
    let total_seasons = request
        .total_seasons
        .as_ref()
        .and_then(coerce_count)
        .or_else(|| existing.and_then(|row| row.total_seasons));

    // Base episode state: the persisted values, unless the request carries a
    // full-object override (bulk reset).
    let mut watched_episodes = match &request.watched_episodes {
        Some(override_map) => override_map.clone(),
        None => existing
            .map(|row| row.watched_episodes.clone())
            .unwrap_or_default(),
    };
    let mut last_watched = match &request.last_watched_episode {
        Some(override_value) => override_value.clone(),
        None => existing.and_then(|row| row.last_watched_episode.clone()),
    };

    if let Some(toggle) = toggle {
        let key = episode_key(toggle.season, toggle.episode);
        if toggle.watched {
            watched_episodes.insert(key, true);
            last_watched = Some(LastWatchedEpisode {
                season: toggle.season,
                episode: toggle.episode,
                timestamp: now,
            });
        } else {
            watched_episodes.remove(&key);
            // Cleared, not recomputed: no search through history for the
            // previous most-recent episode.
            let matches_last = last_watched
                .as_ref()
                .is_some_and(|last| last.season == toggle.season && last.episode == toggle.episode);
            if matches_last {
                last_watched = None;
            }
        }
    }

    let mut episodes_in_season = existing
        .map(|row| row.episodes_in_season.clone())
        .unwrap_or_default();
    if let Some(counts) = &request.episodes_in_season {
        for (season, raw_count) in counts {
            match coerce_count(raw_count) {
                Some(count) => {
                    episodes_in_season.insert(season.clone(), count);
                }
                None => {
                    tracing::warn!(
                        imdb_id = %imdb_id,
                        season = %season,
                        value = %raw_count,
                        "Dropping invalid episode count"
                    );
                }
            }
        }
    }

    let status = resolve_status(
        request.status.as_deref(),
        existing.map(|row| row.status.as_str()),
    )?;

    Ok(WatchedProgress {
        imdb_id,
        media_type: MediaType::Tv,
        title,
        poster_url,
        status: status.to_string(),
        watched_episodes,
        total_seasons,
        episodes_in_season,
        last_watched_episode: last_watched,
        last_interaction_date: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EpisodeToggle;
    use serde_json::json;
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn request(imdb_id: &str) -> WatchedUpsertRequest {
        WatchedUpsertRequest {
            imdb_id: Some(imdb_id.to_string()),
            media_type: Some("tv".to_string()),
            title: Some("Severance".to_string()),
            ..Default::default()
        }
    }

    fn toggle_request(imdb_id: &str, season: i64, episode: i64, watched: bool) -> WatchedUpsertRequest {
        WatchedUpsertRequest {
            watched_episode: Some(EpisodeToggle {
                season: Some(season),
                episode: Some(episode),
                watched: Some(watched),
            }),
            ..request(imdb_id)
        }
    }

    #[test]
    fn episode_key_concatenates_unprefixed_integers() {
        assert_eq!(episode_key(1, 3), "S1E3");
        assert_eq!(episode_key(12, 100), "S12E100");
    }

    #[test]
    fn toggle_on_records_episode_and_last_watched() {
        let merged = merge_tv(None, &toggle_request("tt1", 1, 3, true), now()).unwrap();

        assert_eq!(merged.watched_episodes.get("S1E3"), Some(&true));
        let last = merged.last_watched_episode.unwrap();
        assert_eq!((last.season, last.episode), (1, 3));
        assert_eq!(last.timestamp, now());
        assert_eq!(merged.last_interaction_date, now());
    }

    #[test]
    fn toggle_on_twice_is_idempotent() {
        let once = merge_tv(None, &toggle_request("tt1", 1, 3, true), now()).unwrap();
        let twice = merge_tv(Some(&once), &toggle_request("tt1", 1, 3, true), now()).unwrap();

        assert_eq!(once.watched_episodes, twice.watched_episodes);
        assert_eq!(once.last_watched_episode, twice.last_watched_episode);
    }

    #[test]
    fn toggle_off_removes_episode_and_clears_matching_last_watched() {
        let on = merge_tv(None, &toggle_request("tt1", 1, 1, true), now()).unwrap();
        let off = merge_tv(Some(&on), &toggle_request("tt1", 1, 1, false), now()).unwrap();

        assert!(off.watched_episodes.is_empty());
        assert!(off.last_watched_episode.is_none());
    }

    #[test]
    fn toggle_off_keeps_last_watched_for_other_episode() {
        let first = merge_tv(None, &toggle_request("tt1", 1, 1, true), now()).unwrap();
        let second = merge_tv(Some(&first), &toggle_request("tt1", 1, 2, true), now()).unwrap();
        let off = merge_tv(Some(&second), &toggle_request("tt1", 1, 1, false), now()).unwrap();

        assert_eq!(off.watched_episodes.get("S1E2"), Some(&true));
        assert!(!off.watched_episodes.contains_key("S1E1"));
        let last = off.last_watched_episode.unwrap();
        assert_eq!((last.season, last.episode), (1, 2));
    }

    #[test]
    fn toggle_off_unknown_episode_is_a_noop_on_the_map() {
        let on = merge_tv(None, &toggle_request("tt1", 1, 1, true), now()).unwrap();
        let off = merge_tv(Some(&on), &toggle_request("tt1", 4, 9, false), now()).unwrap();

        assert_eq!(off.watched_episodes, on.watched_episodes);
        assert_eq!(off.last_watched_episode, on.last_watched_episode);
    }

    #[test]
    fn incomplete_toggle_is_rejected() {
        let mut req = request("tt1");
        req.watched_episode = Some(EpisodeToggle {
            season: Some(1),
            episode: Some(2),
            watched: None,
        });

        let err = merge_tv(None, &req, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn title_and_poster_fall_back_to_existing_then_null() {
        let existing = merge_tv(
            None,
            &WatchedUpsertRequest {
                poster_url: Some("http://img/1.jpg".to_string()),
                ..request("tt1")
            },
            now(),
        )
        .unwrap();

        // Request omits both; persisted values win.
        let mut bare = request("tt1");
        bare.title = None;
        let merged = merge_tv(Some(&existing), &bare, now()).unwrap();
        assert_eq!(merged.title.as_deref(), Some("Severance"));
        assert_eq!(merged.poster_url.as_deref(), Some("http://img/1.jpg"));

        // No request value, no persisted row: null.
        let mut fresh = request("tt2");
        fresh.title = None;
        let merged = merge_tv(None, &fresh, now()).unwrap();
        assert!(merged.title.is_none());
        assert!(merged.poster_url.is_none());
    }

    #[test]
    fn total_seasons_accepts_numbers_and_numeric_strings() {
        let mut req = request("tt1");
        req.total_seasons = Some(json!(4));
        let merged = merge_tv(None, &req, now()).unwrap();
        assert_eq!(merged.total_seasons, Some(4));

        req.total_seasons = Some(json!("7"));
        let merged = merge_tv(None, &req, now()).unwrap();
        assert_eq!(merged.total_seasons, Some(7));
    }

    #[test]
    fn non_numeric_total_seasons_falls_back_to_existing() {
        let mut seeded = request("tt1");
        seeded.total_seasons = Some(json!(3));
        let existing = merge_tv(None, &seeded, now()).unwrap();

        let mut req = request("tt1");
        req.total_seasons = Some(json!("lots"));
        let merged = merge_tv(Some(&existing), &req, now()).unwrap();
        assert_eq!(merged.total_seasons, Some(3));
    }

    #[test]
    fn episode_counts_merge_additively_and_drop_invalid_values() {
        let mut first = request("tt1");
        first.episodes_in_season = Some(HashMap::from([
            ("1".to_string(), json!(10)),
            ("2".to_string(), json!("8")),
        ]));
        let seeded = merge_tv(None, &first, now()).unwrap();
        assert_eq!(seeded.episodes_in_season.get("1"), Some(&10));
        assert_eq!(seeded.episodes_in_season.get("2"), Some(&8));

        let mut second = request("tt1");
        second.episodes_in_season = Some(HashMap::from([
            ("2".to_string(), json!(9)),
            ("3".to_string(), json!("n/a")),
            ("4".to_string(), json!(-5)),
        ]));
        let merged = merge_tv(Some(&seeded), &second, now()).unwrap();

        // Season 1 untouched, season 2 overwritten, invalid entries skipped.
        assert_eq!(merged.episodes_in_season.get("1"), Some(&10));
        assert_eq!(merged.episodes_in_season.get("2"), Some(&9));
        assert!(!merged.episodes_in_season.contains_key("3"));
        assert!(!merged.episodes_in_season.contains_key("4"));
    }

    #[test]
    fn status_prefers_request_then_existing_then_default() {
        assert_eq!(resolve_status(Some("completed"), None).unwrap(), "completed");
        assert_eq!(
            resolve_status(Some("bogus"), Some("on_hold")).unwrap(),
            "on_hold"
        );
        assert_eq!(resolve_status(None, Some("nonsense")).unwrap(), "watching");
        assert_eq!(resolve_status(None, None).unwrap(), "watching");
    }

    #[test]
    fn invalid_status_is_normalized_in_the_merged_row() {
        let mut req = request("tt1");
        req.status = Some("binged".to_string());
        let merged = merge_tv(None, &req, now()).unwrap();
        assert_eq!(merged.status, "watching");
    }

    #[test]
    fn bulk_reset_clears_episode_state() {
        let seeded = merge_tv(None, &toggle_request("tt1", 2, 4, true), now()).unwrap();

        let mut reset = request("tt1");
        reset.watched_episodes = Some(HashMap::new());
        reset.last_watched_episode = Some(None);
        let merged = merge_tv(Some(&seeded), &reset, now()).unwrap();

        assert!(merged.watched_episodes.is_empty());
        assert!(merged.last_watched_episode.is_none());
    }

    #[test]
    fn reset_and_toggle_in_one_request_applies_toggle_after_reset() {
        let seeded = merge_tv(None, &toggle_request("tt1", 1, 1, true), now()).unwrap();

        let mut req = toggle_request("tt1", 3, 7, true);
        req.watched_episodes = Some(HashMap::new());
        req.last_watched_episode = Some(None);
        let merged = merge_tv(Some(&seeded), &req, now()).unwrap();

        assert_eq!(merged.watched_episodes.len(), 1);
        assert_eq!(merged.watched_episodes.get("S3E7"), Some(&true));
        let last = merged.last_watched_episode.unwrap();
        assert_eq!((last.season, last.episode), (3, 7));
    }

    #[test]
    fn missing_imdb_id_is_rejected() {
        let mut req = request("tt1");
        req.imdb_id = None;
        let err = merge_tv(None, &req, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
