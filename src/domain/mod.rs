// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// This file MUST declare all domain modules and re-export their public API.
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cast;
pub mod filter;
pub mod movie;
pub mod paginated;
pub mod query;
pub mod rating;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Movie Domain
pub use movie::{validate_movie, validate_payload, Movie, MoviePayload, Provider, ProviderFlags};

// Cast & trailers
pub use cast::{CastMember, Trailer};

// Filters
pub use filter::{Filter, FilterContext, FilterSet, SortOrder};

// Pagination
pub use paginated::{can_fetch_next, PaginatedResult, FIRST_PAGE};

// Views
pub use query::{MovieQueryType, ViewId};

pub use rating::Rating;

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
