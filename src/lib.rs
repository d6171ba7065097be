// src/lib.rs
// MovieHub - Movie metadata aggregation core
//
// Architecture:
// - Domain-centric: entities, filters and invariants live in `domain`
// - One store: every view projection is derived from `state::MoviesState`
// - Event-driven: the store announces changes, the controller re-renders
// - Serialized: store and views are only touched by the core runtime loop
// - Providers, cache and views are traits supplied by the embedding application

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod state;

// ============================================================================
// ORCHESTRATION
// ============================================================================

pub mod integrations;
pub mod services;

// ============================================================================
// APPLICATION LAYER
// ============================================================================

pub mod application;

// ============================================================================
// PUBLIC API - Domain
// ============================================================================

pub use domain::{
    validate_movie,
    validate_payload,
    CastMember,
    DomainError,
    DomainResult,
    Filter,
    FilterContext,
    FilterSet,
    Movie,
    MoviePayload,
    MovieQueryType,
    PaginatedResult,
    Provider,
    Rating,
    Trailer,
    ViewId,
};

// ============================================================================
// PUBLIC API - Errors & Config
// ============================================================================

pub use config::{CoreConfig, FilterConfig, PreferencesConfig};
pub use error::{AppError, AppResult, NetworkError};

// ============================================================================
// PUBLIC API - Events & State
// ============================================================================

pub use events::{create_event_bus, EventBus, EventScope, StateEvent};
pub use state::{Account, CatalogConfiguration, MoviesState};

// ============================================================================
// PUBLIC API - Collaborators
// ============================================================================

pub use integrations::{CatalogClient, LocalMovieCache, TrackerClient};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{ListHeader, ListItem, MovieFetchService, MovieWriteService, TaskExecutor};

// ============================================================================
// PUBLIC API - Application Layer
// ============================================================================

pub use application::{
    CoreHandle,
    CoreRuntime,
    DetailCapabilities,
    DiscoverTab,
    MovieController,
    MovieIntent,
    MovieOperation,
    MovieView,
};
