// src/services/fetch_policy.rs
//
// Fetch Policy Table
//
// CRITICAL RULES:
// - One row per view type; the fetch service reads the row, it never re-derives it
// - Staleness is hard-coded per view type, not configurable
// - Cross-operation couplings are named rules, never a general mechanism

use crate::config::PreferencesConfig;
use crate::domain::{Movie, MovieQueryType, Provider};

/// When an attach-time ("if needed") fetch is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    /// Collection empty and the local cache already consulted
    EmptyAfterCacheLoad,
    /// Collection absent or empty
    Empty,
    /// No listing yet, or a listing without items
    EmptyFirstPage,
    /// Entity unknown, or a provider still owes its full payload
    EntityNeedsFullFetch,
    /// Entity known but the sub-list is empty
    SubListEmpty,
    /// Only explicit requests fetch
    Never,
}

/// What an explicit refresh does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRule {
    Refetch,
    /// Clear the listing and start over from the first page
    RestartFromFirstPage,
    /// Refetch, failing fast without a session
    RefetchLoggedInOnly,
    /// Bypass the staleness check
    Force,
    /// A new query resets to the first page
    NewQuery,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub query_type: MovieQueryType,
    /// Rendered and fetched only with a tracker session
    pub requires_login: bool,
    pub trigger: FetchTrigger,
    pub refresh: RefreshRule,
}

const fn row(
    query_type: MovieQueryType,
    requires_login: bool,
    trigger: FetchTrigger,
    refresh: RefreshRule,
) -> FetchPolicy {
    FetchPolicy {
        query_type,
        requires_login,
        trigger,
        refresh,
    }
}

pub static POLICY_TABLE: [FetchPolicy; 11] = [
    row(MovieQueryType::Library, true, FetchTrigger::EmptyAfterCacheLoad, RefreshRule::Refetch),
    row(MovieQueryType::Watchlist, true, FetchTrigger::EmptyAfterCacheLoad, RefreshRule::Refetch),
    row(MovieQueryType::Trending, false, FetchTrigger::Empty, RefreshRule::Refetch),
    row(MovieQueryType::Popular, false, FetchTrigger::EmptyFirstPage, RefreshRule::RestartFromFirstPage),
    row(MovieQueryType::Upcoming, false, FetchTrigger::EmptyFirstPage, RefreshRule::RestartFromFirstPage),
    row(MovieQueryType::NowPlaying, false, FetchTrigger::EmptyFirstPage, RefreshRule::RestartFromFirstPage),
    row(MovieQueryType::Recommended, true, FetchTrigger::Empty, RefreshRule::RefetchLoggedInOnly),
    row(MovieQueryType::Detail, false, FetchTrigger::EntityNeedsFullFetch, RefreshRule::Force),
    row(MovieQueryType::Related, false, FetchTrigger::SubListEmpty, RefreshRule::Unsupported),
    row(MovieQueryType::Cast, false, FetchTrigger::SubListEmpty, RefreshRule::Unsupported),
    row(MovieQueryType::Search, false, FetchTrigger::Never, RefreshRule::NewQuery),
];

pub fn policy_for(query_type: MovieQueryType) -> Option<&'static FetchPolicy> {
    POLICY_TABLE.iter().find(|p| p.query_type == query_type)
}

pub fn requires_login(query_type: MovieQueryType) -> bool {
    policy_for(query_type).is_some_and(|p| p.requires_login)
}

impl FetchTrigger {
    /// Evaluate a collection trigger. `items` is `None` when nothing was fetched yet.
    pub fn collection_needs_fetch(&self, items: Option<usize>, cache_loaded: bool) -> bool {
        let empty = items.map_or(true, |n| n == 0);
        match self {
            FetchTrigger::EmptyAfterCacheLoad => empty && cache_loaded,
            FetchTrigger::Empty | FetchTrigger::EmptyFirstPage => empty,
            _ => false,
        }
    }
}

/// Providers whose detail fetch is due for `movie`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailPlan {
    pub tracker: bool,
    pub catalog: bool,
}

impl DetailPlan {
    pub fn for_movie(movie: &Movie, logged_in: bool, force: bool) -> Self {
        let due = |provider: Provider| {
            if force {
                !movie.is_fetch_in_flight(provider)
            } else {
                movie.needs_full_fetch(provider)
            }
        };
        Self {
            tracker: logged_in && movie.tracker_lookup_id().is_some() && due(Provider::Tracker),
            catalog: movie.catalog_id.is_some() && due(Provider::Catalog),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.tracker && !self.catalog
    }
}

// ============================================================================
// COUPLING RULES
// ============================================================================

/// The only places where one operation triggers another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouplingRule {
    /// Marking movies seen also removes them from the watchlist
    MarkSeenRemovesFromWatchlist,
    /// A flag change made from the Recommended view refetches recommendations
    RefetchRecommendedOnFlagChange,
}

impl CouplingRule {
    pub fn mark_seen_removes_from_watchlist(logged_in: bool, preferences: &PreferencesConfig) -> bool {
        logged_in && preferences.remove_from_watchlist_on_watched
    }

    pub fn refetch_recommended_on_flag_change(origin: Option<MovieQueryType>) -> bool {
        origin == Some(MovieQueryType::Recommended)
    }
}

impl std::fmt::Display for CouplingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouplingRule::MarkSeenRemovesFromWatchlist => write!(f, "mark-seen-removes-from-watchlist"),
            CouplingRule::RefetchRecommendedOnFlagChange => {
                write!(f, "refetch-recommended-on-flag-change")
            }
        }
    }
}
