// src/state/mod.rs
//
// Shared State - the store every view projection is derived from

pub mod identity_index;
pub mod movies_state;
pub mod session;

pub use identity_index::{IdentityIndex, MovieKey, PutOutcome};
pub use movies_state::{MoviePage, MoviesState, RequestKey, RequestToken};
pub use session::{Account, CatalogConfiguration};
