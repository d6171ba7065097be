// src/domain/filter.rs
//
// Closed set of movie predicates used for user filters and list sections.
// The predicate and exclusivity tables live here as plain match arms.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::movie::Movie;

/// Named movie predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// In the user's collection
    Collection,
    /// Watched by the user
    Seen,
    /// Not watched by the user
    Unseen,
    /// Release date in the future
    NotReleased,
    /// Release date in the past
    Released,
    /// Released beyond the "soon" threshold
    Upcoming,
    /// Released in the future, within the "soon" threshold
    Soon,
    /// Public or user rating above the cutoff
    HighlyRated,
}

/// Ordering applied inside a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    ReleaseDateAscending,
}

/// Everything a predicate needs besides the movie
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
    pub now: DateTime<Utc>,
    pub soon_threshold: Duration,
    /// Percent; compared against max(public percent, user rating x 10)
    pub highly_rated_cutoff: u8,
}

impl FilterContext {
    pub fn new(now: DateTime<Utc>, soon_threshold: Duration, highly_rated_cutoff: u8) -> Self {
        Self {
            now,
            soon_threshold,
            highly_rated_cutoff,
        }
    }

    fn soon_boundary(&self) -> DateTime<Utc> {
        self.now + self.soon_threshold
    }
}

impl Filter {
    pub const ALL: [Filter; 8] = [
        Filter::Collection,
        Filter::Seen,
        Filter::Unseen,
        Filter::NotReleased,
        Filter::Released,
        Filter::Upcoming,
        Filter::Soon,
        Filter::HighlyRated,
    ];

    pub fn matches(&self, movie: &Movie, ctx: &FilterContext) -> bool {
        match self {
            Filter::Collection => movie.in_collection,
            Filter::Seen => movie.watched,
            Filter::Unseen => !movie.watched,
            Filter::NotReleased => release_time(movie) > ctx.now,
            Filter::Released => release_time(movie) < ctx.now,
            Filter::Upcoming => release_time(movie) > ctx.soon_boundary(),
            Filter::Soon => {
                let released = release_time(movie);
                released > ctx.now && released <= ctx.soon_boundary()
            }
            Filter::HighlyRated => {
                let user_percent = u16::from(movie.user_rating) * 10;
                let best = u16::from(movie.rating_percent).max(user_percent);
                best >= u16::from(ctx.highly_rated_cutoff)
            }
        }
    }

    /// Filters that cannot be active together with this one
    pub fn mutually_exclusive(&self) -> &'static [Filter] {
        match self {
            Filter::Seen => &[Filter::Unseen],
            Filter::Unseen => &[Filter::Seen],
            _ => &[],
        }
    }

    pub fn sort_order(&self) -> SortOrder {
        SortOrder::ReleaseDateAscending
    }

    /// Section header text
    pub fn title(&self) -> &'static str {
        match self {
            Filter::Collection => "COLLECTION",
            Filter::Seen => "SEEN",
            Filter::Unseen => "UNSEEN",
            Filter::NotReleased => "NOT RELEASED",
            Filter::Released => "RELEASED",
            Filter::Upcoming => "UPCOMING",
            Filter::Soon => "SOON",
            Filter::HighlyRated => "HIGHLY RATED",
        }
    }
}

impl SortOrder {
    pub fn sort(&self, movies: &mut [&Movie]) {
        match self {
            SortOrder::ReleaseDateAscending => {
                movies.sort_by(|a, b| Movie::compare_release_date(a, b))
            }
        }
    }
}

/// An undated movie counts as released at the epoch
fn release_time(movie: &Movie) -> DateTime<Utc> {
    movie.released.unwrap_or(DateTime::UNIX_EPOCH)
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// The set of filters currently active on filterable views
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: BTreeSet<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, dropping its exclusive counterparts.
    /// Returns false if it was already active.
    pub fn add(&mut self, filter: Filter) -> bool {
        if !self.filters.insert(filter) {
            return false;
        }
        for exclusive in filter.mutually_exclusive() {
            self.filters.remove(exclusive);
        }
        true
    }

    pub fn remove(&mut self, filter: Filter) -> bool {
        self.filters.remove(&filter)
    }

    /// Returns false if there was nothing to clear
    pub fn clear(&mut self) -> bool {
        if self.filters.is_empty() {
            return false;
        }
        self.filters.clear();
        true
    }

    pub fn contains(&self, filter: Filter) -> bool {
        self.filters.contains(&filter)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Filter> + '_ {
        self.filters.iter().copied()
    }

    /// Logical AND of every active filter
    pub fn matches(&self, movie: &Movie, ctx: &FilterContext) -> bool {
        self.filters.iter().all(|f| f.matches(movie, ctx))
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        let mut set = FilterSet::new();
        for filter in iter {
            set.add(filter);
        }
        set
    }
}
