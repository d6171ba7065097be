// src/events/mod.rs
//
// State Change Notifications - Public API

pub mod bus;
pub mod types;

pub use types::{EventScope, StateEvent};

pub use types::{
    // Session & configuration
    AccountChanged,
    CacheLoaded,
    CatalogConfigurationChanged,
    FiltersChanged,
    InTheatresChanged,
    // Collections
    LibraryChanged,
    // Entities
    MovieFlagsUpdated,
    MovieInformationUpdated,
    MovieUserRatingChanged,
    PopularChanged,
    RecommendedChanged,
    SearchResultChanged,
    // View signals
    ShowError,
    ShowLoadingProgress,
    TrendingChanged,
    UpcomingChanged,
    WatchingChanged,
    WatchlistChanged,
};

pub use bus::{EventBus, EventLogEntry, SubscriptionId};

/// Initialize a new event bus
pub fn create_event_bus() -> EventBus {
    EventBus::new()
}
