// src/application/dto/mod.rs
//
// Data Transfer Objects
//
// CRITICAL PRINCIPLES:
// - DTOs are UI-friendly representations
// - DTOs are simple, serializable values
// - Conversion FROM domain entities only (never TO)

use serde::{Deserialize, Serialize};

use crate::domain::{Movie, Provider};

pub use crate::services::projection::{ListHeader, ListItem};

// ============================================================================
// BATCH OPERATIONS
// ============================================================================

/// Operation a list view may offer on a selection of movies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieOperation {
    MarkSeen,
    AddToCollection,
    AddToWatchlist,
}

impl MovieOperation {
    /// Offered on unsectioned lists while logged in
    pub const BATCH: [MovieOperation; 3] = [
        MovieOperation::MarkSeen,
        MovieOperation::AddToCollection,
        MovieOperation::AddToWatchlist,
    ];
}

// ============================================================================
// DISCOVER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverTab {
    Popular,
    InTheatres,
    Upcoming,
    Recommended,
}

impl DiscoverTab {
    pub fn for_session(logged_in: bool) -> Vec<DiscoverTab> {
        let mut tabs = vec![
            DiscoverTab::Popular,
            DiscoverTab::InTheatres,
            DiscoverTab::Upcoming,
        ];
        if logged_in {
            tabs.push(DiscoverTab::Recommended);
        }
        tabs
    }
}

// ============================================================================
// DETAIL
// ============================================================================

/// Which tracker-backed controls a detail view enables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailCapabilities {
    pub rate: bool,
    pub collection: bool,
    pub watchlist: bool,
    pub toggle_watched: bool,
    pub checkin: bool,
}

impl DetailCapabilities {
    /// Everything needs a session and tracker data for the movie
    pub fn for_movie(logged_in: bool, movie: &Movie) -> Self {
        let enabled = logged_in && movie.is_loaded_from(Provider::Tracker);
        Self {
            rate: enabled,
            collection: enabled,
            watchlist: enabled,
            toggle_watched: enabled,
            checkin: enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MoviePayload;

    #[test]
    fn test_discover_tabs() {
        assert_eq!(DiscoverTab::for_session(false).len(), 3);
        assert_eq!(
            DiscoverTab::for_session(true).last(),
            Some(&DiscoverTab::Recommended)
        );
    }

    #[test]
    fn test_detail_capabilities_need_tracker_data() {
        let catalog_only = Movie::from_payload(&MoviePayload::catalog(949));
        assert_eq!(
            DetailCapabilities::for_movie(true, &catalog_only),
            DetailCapabilities::default()
        );

        let tracked = Movie::from_payload(&MoviePayload::tracker("tt0113277"));
        assert!(DetailCapabilities::for_movie(true, &tracked).rate);
        assert!(!DetailCapabilities::for_movie(false, &tracked).checkin);
    }
}
