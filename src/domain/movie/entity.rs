// src/domain/movie/entity.rs
//
// Movie entity and the partial payloads that feed it.
//
// CRITICAL RULES:
// - A Movie lives in the identity index for the whole process lifetime
// - Payloads never replace a Movie, they are merged into it
// - Tracker data owns the user-scoped fields
// - Catalog data owns the catalog fields once it has supplied them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::domain::cast::{CastMember, Trailer};

/// Remote metadata source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Authenticated, per-user tracking service (string ids)
    Tracker,
    /// Public catalog service (integer ids)
    Catalog,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Tracker => write!(f, "tracker"),
            Provider::Catalog => write!(f, "catalog"),
        }
    }
}

/// One boolean per provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFlags {
    pub tracker: bool,
    pub catalog: bool,
}

impl ProviderFlags {
    pub fn get(&self, provider: Provider) -> bool {
        match provider {
            Provider::Tracker => self.tracker,
            Provider::Catalog => self.catalog,
        }
    }

    pub fn set(&mut self, provider: Provider, value: bool) {
        match provider {
            Provider::Tracker => self.tracker = value,
            Provider::Catalog => self.catalog = value,
        }
    }
}

/// Partial movie data as returned by one provider.
///
/// `None` means "not present in this payload", never "cleared".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoviePayload {
    pub source: Option<Provider>,

    /// True for a full detail response, false for a listing summary
    pub detail: bool,

    pub tracker_id: Option<String>,
    pub catalog_id: Option<i64>,

    // Catalog fields
    pub title: Option<String>,
    pub released: Option<DateTime<Utc>>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub rating_percent: Option<u8>,

    // User-scoped fields (tracker only)
    pub watched: Option<bool>,
    pub in_collection: Option<bool>,
    pub in_watchlist: Option<bool>,
    pub user_rating: Option<u8>,

    pub cast: Option<Vec<CastMember>>,
    pub trailers: Option<Vec<Trailer>>,
}

impl MoviePayload {
    /// Listing summary from the tracker
    pub fn tracker(tracker_id: impl Into<String>) -> Self {
        Self {
            source: Some(Provider::Tracker),
            tracker_id: Some(tracker_id.into()),
            ..Self::default()
        }
    }

    /// Listing summary from the catalog
    pub fn catalog(catalog_id: i64) -> Self {
        Self {
            source: Some(Provider::Catalog),
            catalog_id: Some(catalog_id),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_released(mut self, released: DateTime<Utc>) -> Self {
        self.released = Some(released);
        self
    }

    pub fn as_detail(mut self) -> Self {
        self.detail = true;
        self
    }

    pub fn has_identity(&self) -> bool {
        self.tracker_id.as_deref().is_some_and(|id| !id.trim().is_empty())
            || self.catalog_id.is_some()
    }
}

/// A movie as known to this process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    /// Internal immutable identifier
    pub id: Uuid,

    pub tracker_id: Option<String>,
    pub catalog_id: Option<i64>,

    pub title: Option<String>,
    pub released: Option<DateTime<Utc>>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,

    /// Public rating, 0-100
    pub rating_percent: u8,

    pub watched: bool,
    pub in_collection: bool,
    pub in_watchlist: bool,

    /// User rating, 0-10 (0 means not rated)
    pub user_rating: u8,

    pub cast: Vec<CastMember>,

    /// Related movies, by internal id
    pub related: Vec<Uuid>,

    pub trailers: Vec<Trailer>,

    /// Providers that delivered at least one payload
    loaded_from: ProviderFlags,

    /// Providers that delivered a full detail payload
    full_fetched: ProviderFlags,

    /// Detail fetches currently running
    fetch_in_flight: ProviderFlags,

    /// Whether the catalog fields came from the catalog
    catalog_fields_from_catalog: bool,
}

impl Movie {
    /// Create an empty entity. Identity is filled by the first merge.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            tracker_id: None,
            catalog_id: None,
            title: None,
            released: None,
            overview: None,
            poster_path: None,
            backdrop_path: None,
            rating_percent: 0,
            watched: false,
            in_collection: false,
            in_watchlist: false,
            user_rating: 0,
            cast: Vec::new(),
            related: Vec::new(),
            trailers: Vec::new(),
            loaded_from: ProviderFlags::default(),
            full_fetched: ProviderFlags::default(),
            fetch_in_flight: ProviderFlags::default(),
            catalog_fields_from_catalog: false,
        }
    }

    pub fn from_payload(payload: &MoviePayload) -> Self {
        let mut movie = Self::new();
        movie.merge_from(payload);
        movie
    }

    /// Combine a partial provider response into this entity.
    ///
    /// Fields absent from the payload are left untouched. User-scoped fields are only
    /// taken from tracker payloads. Catalog fields from the tracker only fill values the
    /// catalog has not supplied yet.
    pub fn merge_from(&mut self, payload: &MoviePayload) {
        if self.tracker_id.is_none() {
            self.tracker_id = payload.tracker_id.clone();
        }
        if self.catalog_id.is_none() {
            self.catalog_id = payload.catalog_id;
        }

        let from_catalog = payload.source == Some(Provider::Catalog);
        let overwrite_catalog_fields = from_catalog || !self.catalog_fields_from_catalog;

        merge_field(&mut self.title, &payload.title, overwrite_catalog_fields);
        merge_field(&mut self.released, &payload.released, overwrite_catalog_fields);
        merge_field(&mut self.overview, &payload.overview, overwrite_catalog_fields);
        merge_field(&mut self.poster_path, &payload.poster_path, overwrite_catalog_fields);
        merge_field(&mut self.backdrop_path, &payload.backdrop_path, overwrite_catalog_fields);
        if let Some(percent) = payload.rating_percent {
            if overwrite_catalog_fields || self.rating_percent == 0 {
                self.rating_percent = percent.min(100);
            }
        }

        if from_catalog
            && (payload.title.is_some()
                || payload.released.is_some()
                || payload.poster_path.is_some()
                || payload.rating_percent.is_some())
        {
            self.catalog_fields_from_catalog = true;
        }

        if payload.source == Some(Provider::Tracker) {
            if let Some(watched) = payload.watched {
                self.watched = watched;
            }
            if let Some(in_collection) = payload.in_collection {
                self.in_collection = in_collection;
            }
            if let Some(in_watchlist) = payload.in_watchlist {
                self.in_watchlist = in_watchlist;
            }
            if let Some(rating) = payload.user_rating {
                self.user_rating = rating.min(10);
            }
        }

        if let Some(cast) = &payload.cast {
            if !cast.is_empty() || self.cast.is_empty() {
                self.cast = cast.clone();
            }
        }
        if let Some(trailers) = &payload.trailers {
            if !trailers.is_empty() || self.trailers.is_empty() {
                self.trailers = trailers.clone();
            }
        }

        if let Some(source) = payload.source {
            self.loaded_from.set(source, true);
            if payload.detail {
                self.full_fetched.set(source, true);
                self.fetch_in_flight.set(source, false);
            }
        }
    }

    /// Fold a duplicate entity for the same movie into this one
    pub fn absorb(&mut self, other: Movie) {
        if self.tracker_id.is_none() {
            self.tracker_id = other.tracker_id;
        }
        if self.catalog_id.is_none() {
            self.catalog_id = other.catalog_id;
        }
        if other.catalog_fields_from_catalog && !self.catalog_fields_from_catalog {
            self.title = other.title.or(self.title.take());
            self.released = other.released.or(self.released);
            self.overview = other.overview.or(self.overview.take());
            self.poster_path = other.poster_path.or(self.poster_path.take());
            self.backdrop_path = other.backdrop_path.or(self.backdrop_path.take());
            self.rating_percent = other.rating_percent;
            self.catalog_fields_from_catalog = true;
        } else {
            self.title = self.title.take().or(other.title);
            self.released = self.released.or(other.released);
            self.overview = self.overview.take().or(other.overview);
            self.poster_path = self.poster_path.take().or(other.poster_path);
            self.backdrop_path = self.backdrop_path.take().or(other.backdrop_path);
        }
        if other.loaded_from.tracker && !self.loaded_from.tracker {
            self.watched = other.watched;
            self.in_collection = other.in_collection;
            self.in_watchlist = other.in_watchlist;
            self.user_rating = other.user_rating;
        }
        if self.cast.is_empty() {
            self.cast = other.cast;
        }
        if self.related.is_empty() {
            self.related = other.related;
        }
        if self.trailers.is_empty() {
            self.trailers = other.trailers;
        }
        for provider in [Provider::Tracker, Provider::Catalog] {
            if other.loaded_from.get(provider) {
                self.loaded_from.set(provider, true);
            }
            if other.full_fetched.get(provider) {
                self.full_fetched.set(provider, true);
            }
            if other.fetch_in_flight.get(provider) {
                self.fetch_in_flight.set(provider, true);
            }
        }
    }

    /// True while only a listing payload (or nothing) has come from `provider`
    /// and no detail fetch for it is running.
    pub fn needs_full_fetch(&self, provider: Provider) -> bool {
        !self.full_fetched.get(provider) && !self.fetch_in_flight.get(provider)
    }

    /// Mark a detail fetch as started. Returns false if one is already running.
    pub fn mark_full_fetch_started(&mut self, provider: Provider) -> bool {
        if self.fetch_in_flight.get(provider) {
            return false;
        }
        self.fetch_in_flight.set(provider, true);
        true
    }

    /// Clear the in-flight flag after a failed detail fetch
    pub fn mark_full_fetch_failed(&mut self, provider: Provider) {
        self.fetch_in_flight.set(provider, false);
    }

    pub fn is_fetch_in_flight(&self, provider: Provider) -> bool {
        self.fetch_in_flight.get(provider)
    }

    pub fn is_loaded_from(&self, provider: Provider) -> bool {
        self.loaded_from.get(provider)
    }

    /// Tracker id, or the catalog id rendered as text
    pub fn tracker_lookup_id(&self) -> Option<String> {
        self.tracker_id
            .clone()
            .or_else(|| self.catalog_id.map(|id| id.to_string()))
    }

    /// Library membership as the tracker defines it
    pub fn in_library(&self) -> bool {
        self.watched || self.in_collection
    }

    /// Ascending by release date, undated movies last
    pub fn compare_release_date(a: &Movie, b: &Movie) -> Ordering {
        match (a.released, b.released) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl Default for Movie {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_field<T: Clone>(target: &mut Option<T>, incoming: &Option<T>, overwrite: bool) {
    if let Some(value) = incoming {
        if overwrite || target.is_none() {
            *target = Some(value.clone());
        }
    }
}

impl std::fmt::Display for Movie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.title, &self.tracker_id, self.catalog_id) {
            (Some(title), _, _) => write!(f, "{}", title),
            (None, Some(id), _) => write!(f, "tracker:{}", id),
            (None, None, Some(id)) => write!(f, "catalog:{}", id),
            (None, None, None) => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_summary() -> MoviePayload {
        MoviePayload {
            title: Some("Heat (tracker)".to_string()),
            rating_percent: Some(80),
            watched: Some(true),
            in_watchlist: Some(false),
            user_rating: Some(9),
            ..MoviePayload::tracker("tt0113277")
        }
    }

    #[test]
    fn test_merge_keeps_fields_missing_from_payload() {
        let mut movie = Movie::from_payload(&tracker_summary());
        movie.merge_from(&MoviePayload {
            overview: Some("A group of professional bank robbers".to_string()),
            ..MoviePayload::catalog(949)
        });

        assert_eq!(movie.tracker_id.as_deref(), Some("tt0113277"));
        assert_eq!(movie.catalog_id, Some(949));
        assert!(movie.watched);
        assert_eq!(movie.user_rating, 9);
        assert_eq!(movie.title.as_deref(), Some("Heat (tracker)"));
        assert!(movie.overview.is_some());
    }

    #[test]
    fn test_catalog_wins_catalog_fields() {
        let mut movie = Movie::from_payload(&tracker_summary());
        movie.merge_from(&MoviePayload::catalog(949).with_title("Heat"));
        assert_eq!(movie.title.as_deref(), Some("Heat"));

        // A later tracker payload no longer overrides the title
        movie.merge_from(&tracker_summary());
        assert_eq!(movie.title.as_deref(), Some("Heat"));
    }

    #[test]
    fn test_catalog_never_touches_user_fields() {
        let mut movie = Movie::from_payload(&tracker_summary());
        movie.merge_from(&MoviePayload {
            watched: Some(false),
            user_rating: Some(1),
            ..MoviePayload::catalog(949)
        });
        assert!(movie.watched);
        assert_eq!(movie.user_rating, 9);
    }

    #[test]
    fn test_needs_full_fetch_until_detail_arrives() {
        let mut movie = Movie::from_payload(&tracker_summary());
        assert!(movie.needs_full_fetch(Provider::Tracker));
        assert!(movie.needs_full_fetch(Provider::Catalog));

        movie.merge_from(&tracker_summary().as_detail());
        assert!(!movie.needs_full_fetch(Provider::Tracker));
        assert!(movie.needs_full_fetch(Provider::Catalog));
    }

    #[test]
    fn test_fetch_started_is_guarded() {
        let mut movie = Movie::from_payload(&tracker_summary());
        assert!(movie.mark_full_fetch_started(Provider::Catalog));
        assert!(!movie.mark_full_fetch_started(Provider::Catalog));
        assert!(!movie.needs_full_fetch(Provider::Catalog));
        // Other provider unaffected
        assert!(movie.mark_full_fetch_started(Provider::Tracker));

        movie.mark_full_fetch_failed(Provider::Catalog);
        assert!(movie.needs_full_fetch(Provider::Catalog));
    }

    #[test]
    fn test_detail_merge_clears_in_flight() {
        let mut movie = Movie::from_payload(&MoviePayload::catalog(949));
        movie.mark_full_fetch_started(Provider::Catalog);
        movie.merge_from(&MoviePayload::catalog(949).as_detail());
        assert!(!movie.is_fetch_in_flight(Provider::Catalog));
        assert!(!movie.needs_full_fetch(Provider::Catalog));
    }

    #[test]
    fn test_release_date_ordering_puts_undated_last() {
        let early = Movie::from_payload(
            &MoviePayload::catalog(1).with_released("2001-01-01T00:00:00Z".parse().unwrap()),
        );
        let late = Movie::from_payload(
            &MoviePayload::catalog(2).with_released("2010-01-01T00:00:00Z".parse().unwrap()),
        );
        let undated = Movie::from_payload(&MoviePayload::catalog(3));

        let mut movies = vec![&undated, &late, &early];
        movies.sort_by(|a, b| Movie::compare_release_date(a, b));
        assert_eq!(movies[0].catalog_id, Some(1));
        assert_eq!(movies[1].catalog_id, Some(2));
        assert_eq!(movies[2].catalog_id, Some(3));
    }
}
