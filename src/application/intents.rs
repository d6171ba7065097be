// src/application/intents.rs
//
// User intents a view sends to the core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Filter, Rating};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieIntent {
    AddFilter(Filter),
    RemoveFilter(Filter),
    /// Only notifies when some filter was active
    ClearFilters,
    Refresh,
    ToggleSeen(Uuid),
    ToggleWatchlist(Uuid),
    ToggleCollection(Uuid),
    SetSeen {
        movies: Vec<Uuid>,
        seen: bool,
    },
    SetInWatchlist {
        movies: Vec<Uuid>,
        in_watchlist: bool,
    },
    SetInCollection {
        movies: Vec<Uuid>,
        in_collection: bool,
    },
    Search(String),
    ClearSearch,
    SubmitRating {
        movie: Uuid,
        rating: Rating,
    },
    /// Request the next page of a paginated view
    ScrolledToBottom,
    CheckIn {
        movie: Uuid,
        message: String,
    },
}
