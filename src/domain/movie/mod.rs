pub mod entity;
pub mod invariants;

pub use entity::{Movie, MoviePayload, Provider, ProviderFlags};
pub use invariants::{validate_movie, validate_payload};
