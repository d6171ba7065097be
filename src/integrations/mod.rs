// src/integrations/mod.rs
//
// External Collaborators
//
// Remote providers and the local cache are consumed through these traits only.
// Concrete clients are supplied by the embedding application.

pub mod cache;
pub mod catalog;
pub mod tracker;

pub use cache::LocalMovieCache;
pub use catalog::CatalogClient;
pub use tracker::TrackerClient;

#[cfg(test)]
pub use cache::MockLocalMovieCache;
#[cfg(test)]
pub use catalog::MockCatalogClient;
#[cfg(test)]
pub use tracker::MockTrackerClient;
