// src/domain/query.rs
//
// View-types and the ids of attached views.

use serde::{Deserialize, Serialize};

/// The logical query a presentation surface represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieQueryType {
    Trending,
    Popular,
    Library,
    Watchlist,
    Detail,
    Search,
    NowPlaying,
    Upcoming,
    Recommended,
    Related,
    Cast,
    None,
}

impl MovieQueryType {
    /// Honours the user's active filter set
    pub fn supports_filtering(&self) -> bool {
        matches!(self, MovieQueryType::Library | MovieQueryType::Trending)
    }

    /// Renders a single entity (or one of its sub-lists) rather than a collection
    pub fn is_entity_view(&self) -> bool {
        matches!(
            self,
            MovieQueryType::Detail | MovieQueryType::Related | MovieQueryType::Cast
        )
    }

    /// Backed by a paginated catalog listing
    pub fn is_paginated(&self) -> bool {
        matches!(
            self,
            MovieQueryType::Popular
                | MovieQueryType::NowPlaying
                | MovieQueryType::Upcoming
                | MovieQueryType::Search
        )
    }
}

impl std::fmt::Display for MovieQueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MovieQueryType::Trending => "trending",
            MovieQueryType::Popular => "popular",
            MovieQueryType::Library => "library",
            MovieQueryType::Watchlist => "watchlist",
            MovieQueryType::Detail => "detail",
            MovieQueryType::Search => "search",
            MovieQueryType::NowPlaying => "now_playing",
            MovieQueryType::Upcoming => "upcoming",
            MovieQueryType::Recommended => "recommended",
            MovieQueryType::Related => "related",
            MovieQueryType::Cast => "cast",
            MovieQueryType::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// Identifies an attached view. Work started without a view uses `ViewId::BACKGROUND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewId(pub u32);

impl ViewId {
    pub const BACKGROUND: ViewId = ViewId(0);

    pub fn is_background(&self) -> bool {
        *self == Self::BACKGROUND
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view#{}", self.0)
    }
}
