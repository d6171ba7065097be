// src/events/types.rs
//
// All state-change notifications in the system.
// Each event represents a fact about the shared state that has already happened.
//
// CRITICAL RULES:
// - Events are facts, not commands
// - Events are immutable
// - Events carry only the data needed to react
// - The set is closed: new kinds of change get a new struct here

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{MovieQueryType, ViewId};
use crate::error::NetworkError;

/// Which attached views an event concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// Views of the listed query types
    Queries(&'static [MovieQueryType]),
    /// Only the view that started the work
    View(ViewId),
    /// Every attached view
    AllViews,
}

impl EventScope {
    pub fn includes(&self, view: ViewId, query_type: MovieQueryType) -> bool {
        match self {
            EventScope::Queries(types) => types.contains(&query_type),
            EventScope::View(id) => *id == view,
            EventScope::AllViews => true,
        }
    }
}

/// Trait that all state events must implement
pub trait StateEvent: std::fmt::Debug + Clone + Send + Sync + 'static {
    /// Unique identifier for this event instance
    fn event_id(&self) -> Uuid;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;

    /// Views that should re-render
    fn scope(&self) -> EventScope;
}

macro_rules! state_event {
    ($event:ident, $name:literal, |$this:ident| $scope:expr) => {
        impl StateEvent for $event {
            fn event_id(&self) -> Uuid {
                self.event_id
            }
            fn occurred_at(&self) -> DateTime<Utc> {
                self.occurred_at
            }
            fn event_type(&self) -> &'static str {
                $name
            }
            fn scope(&self) -> EventScope {
                let $this = self;
                $scope
            }
        }
    };
}

macro_rules! collection_event {
    ($(#[$doc:meta])* $event:ident, $name:literal, $queries:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $event {
            pub event_id: Uuid,
            pub occurred_at: DateTime<Utc>,
        }

        impl $event {
            pub fn new() -> Self {
                Self {
                    event_id: Uuid::new_v4(),
                    occurred_at: Utc::now(),
                }
            }
        }

        impl Default for $event {
            fn default() -> Self {
                Self::new()
            }
        }

        state_event!($event, $name, |_this| EventScope::Queries($queries));
    };
}

// ============================================================================
// COLLECTION EVENTS
// ============================================================================

collection_event!(
    /// The library collection was replaced or reset
    LibraryChanged,
    "LibraryChanged",
    &[MovieQueryType::Library, MovieQueryType::Detail]
);

collection_event!(
    /// The watchlist collection was replaced or reset
    WatchlistChanged,
    "WatchlistChanged",
    &[MovieQueryType::Watchlist, MovieQueryType::Detail]
);

collection_event!(TrendingChanged, "TrendingChanged", &[MovieQueryType::Trending]);

collection_event!(PopularChanged, "PopularChanged", &[MovieQueryType::Popular]);

collection_event!(
    /// Now-playing listing changed
    InTheatresChanged,
    "InTheatresChanged",
    &[MovieQueryType::NowPlaying]
);

collection_event!(UpcomingChanged, "UpcomingChanged", &[MovieQueryType::Upcoming]);

collection_event!(
    RecommendedChanged,
    "RecommendedChanged",
    &[MovieQueryType::Recommended]
);

collection_event!(
    SearchResultChanged,
    "SearchResultChanged",
    &[MovieQueryType::Search]
);

collection_event!(
    /// The active filter set was mutated
    FiltersChanged,
    "FiltersChanged",
    &[MovieQueryType::Library, MovieQueryType::Trending]
);

// ============================================================================
// SESSION & CONFIGURATION EVENTS
// ============================================================================

/// Emitted when the tracker session is established or torn down
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountChanged {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub logged_in: bool,
}

impl AccountChanged {
    pub fn new(logged_in: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            logged_in,
        }
    }
}

state_event!(AccountChanged, "AccountChanged", |_this| EventScope::AllViews);

/// Emitted when the catalog configuration (image base urls etc.) arrives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfigurationChanged {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl CatalogConfigurationChanged {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for CatalogConfigurationChanged {
    fn default() -> Self {
        Self::new()
    }
}

state_event!(CatalogConfigurationChanged, "CatalogConfigurationChanged", |_this| {
    EventScope::AllViews
});

/// Emitted once a collection has been read from the local cache.
/// Rendering follows from the collection's own event; this one drives prefetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLoaded {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub collection: MovieQueryType,
}

impl CacheLoaded {
    pub fn new(collection: MovieQueryType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            collection,
        }
    }
}

state_event!(CacheLoaded, "CacheLoaded", |_this| EventScope::Queries(&[]));

// ============================================================================
// ENTITY EVENTS
// ============================================================================

/// Emitted when a write round trip changed watched/collection/watchlist flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieFlagsUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub calling_id: ViewId,
    pub movie_ids: Vec<Uuid>,
}

impl MovieFlagsUpdated {
    pub fn new(calling_id: ViewId, movie_ids: Vec<Uuid>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            calling_id,
            movie_ids,
        }
    }
}

state_event!(MovieFlagsUpdated, "MovieFlagsUpdated", |_this| EventScope::AllViews);

/// Emitted when detail, cast, related or trailer data was merged into a movie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieInformationUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub calling_id: ViewId,
    pub movie_id: Uuid,
}

impl MovieInformationUpdated {
    pub fn new(calling_id: ViewId, movie_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            calling_id,
            movie_id,
        }
    }
}

state_event!(MovieInformationUpdated, "MovieInformationUpdated", |_this| {
    EventScope::Queries(&[
        MovieQueryType::Detail,
        MovieQueryType::Related,
        MovieQueryType::Cast,
    ])
});

/// Emitted when the user's rating round trip completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieUserRatingChanged {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub calling_id: ViewId,
    pub movie_id: Uuid,
}

impl MovieUserRatingChanged {
    pub fn new(calling_id: ViewId, movie_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            calling_id,
            movie_id,
        }
    }
}

state_event!(MovieUserRatingChanged, "MovieUserRatingChanged", |_this| {
    EventScope::AllViews
});

/// Emitted when the movie the user is currently checked in to changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchingChanged {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub movie_id: Option<Uuid>,
}

impl WatchingChanged {
    pub fn new(movie_id: Option<Uuid>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            movie_id,
        }
    }
}

state_event!(WatchingChanged, "WatchingChanged", |_this| {
    EventScope::Queries(&[MovieQueryType::Detail])
});

// ============================================================================
// VIEW SIGNAL EVENTS
// ============================================================================

/// Error for the view that started the failed work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowError {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub calling_id: ViewId,
    pub error: NetworkError,
}

impl ShowError {
    pub fn new(calling_id: ViewId, error: NetworkError) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            calling_id,
            error,
        }
    }
}

state_event!(ShowError, "ShowError", |this| EventScope::View(this.calling_id));

/// Loading indicator toggle for the view that started the work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowLoadingProgress {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub calling_id: ViewId,
    pub show: bool,
    /// Secondary indicator (e.g. loading a further page)
    pub secondary: bool,
}

impl ShowLoadingProgress {
    pub fn new(calling_id: ViewId, show: bool, secondary: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            calling_id,
            show,
            secondary,
        }
    }
}

state_event!(ShowLoadingProgress, "ShowLoadingProgress", |this| {
    EventScope::View(this.calling_id)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_scope() {
        let scope = WatchlistChanged::new().scope();
        assert!(scope.includes(ViewId(1), MovieQueryType::Watchlist));
        assert!(!scope.includes(ViewId(1), MovieQueryType::Popular));
    }

    #[test]
    fn test_view_scope_targets_caller_only() {
        let scope = ShowError::new(ViewId(4), NetworkError::Network).scope();
        assert!(scope.includes(ViewId(4), MovieQueryType::Watchlist));
        assert!(!scope.includes(ViewId(5), MovieQueryType::Watchlist));
    }
}
