// src/integrations/tracker.rs
//
// Authenticated tracker provider boundary
//
// CRITICAL RULES:
// - Implementations own transport, auth headers and payload mapping
// - Every call needs the session established by the account layer
// - Responses are partial movie payloads; merging is done by the caller

use async_trait::async_trait;

use crate::domain::{MoviePayload, Rating};
use crate::error::AppResult;

/// Per-user movie tracking service (string ids)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Watched or collected movies of `username`
    async fn fetch_library(&self, username: &str) -> AppResult<Vec<MoviePayload>>;

    async fn fetch_watchlist(&self, username: &str) -> AppResult<Vec<MoviePayload>>;

    async fn fetch_trending(&self) -> AppResult<Vec<MoviePayload>>;

    async fn fetch_recommendations(&self) -> AppResult<Vec<MoviePayload>>;

    /// Full detail. `id` may be a tracker id or a catalog id rendered as text.
    async fn fetch_detail(&self, id: &str) -> AppResult<MoviePayload>;

    async fn fetch_related(&self, id: &str) -> AppResult<Vec<MoviePayload>>;

    /// Returns the movie with its updated user rating
    async fn submit_rating(&self, id: &str, rating: Rating) -> AppResult<MoviePayload>;

    // ========================================================================
    // FLAG WRITES
    // Each returns the payloads of the movies the tracker actually changed.
    // ========================================================================

    async fn add_to_collection(&self, ids: &[String]) -> AppResult<Vec<MoviePayload>>;

    async fn remove_from_collection(&self, ids: &[String]) -> AppResult<Vec<MoviePayload>>;

    async fn add_to_watchlist(&self, ids: &[String]) -> AppResult<Vec<MoviePayload>>;

    async fn remove_from_watchlist(&self, ids: &[String]) -> AppResult<Vec<MoviePayload>>;

    async fn mark_seen(&self, ids: &[String]) -> AppResult<Vec<MoviePayload>>;

    async fn mark_unseen(&self, ids: &[String]) -> AppResult<Vec<MoviePayload>>;

    /// Check in to a movie; returns the movie now being watched
    async fn check_in(&self, id: &str, message: &str) -> AppResult<MoviePayload>;
}
