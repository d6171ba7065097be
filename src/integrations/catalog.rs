// src/integrations/catalog.rs
//
// Public catalog provider boundary (integer ids, paginated listings)

use async_trait::async_trait;

use crate::domain::{CastMember, MoviePayload, PaginatedResult, Trailer};
use crate::error::AppResult;
use crate::state::CatalogConfiguration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_popular(&self, page: u32) -> AppResult<PaginatedResult<MoviePayload>>;

    async fn fetch_upcoming(&self, page: u32) -> AppResult<PaginatedResult<MoviePayload>>;

    async fn fetch_now_playing(&self, page: u32) -> AppResult<PaginatedResult<MoviePayload>>;

    /// The returned result carries no query; the caller tags it
    async fn search(&self, query: &str, page: u32) -> AppResult<PaginatedResult<MoviePayload>>;

    async fn fetch_detail(&self, id: i64) -> AppResult<MoviePayload>;

    async fn fetch_cast(&self, id: i64) -> AppResult<Vec<CastMember>>;

    async fn fetch_trailers(&self, id: i64) -> AppResult<Vec<Trailer>>;

    async fn fetch_related(&self, id: i64) -> AppResult<Vec<MoviePayload>>;

    /// Image base urls and sizes
    async fn fetch_configuration(&self) -> AppResult<CatalogConfiguration>;
}

