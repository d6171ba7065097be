// src/integrations/cache.rs
//
// Local persistent cache boundary. Storage engine and schema live behind it.

use async_trait::async_trait;

use crate::domain::MoviePayload;
use crate::error::AppResult;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalMovieCache: Send + Sync {
    /// Library entities cached by a previous session
    async fn get_library(&self) -> AppResult<Vec<MoviePayload>>;

    async fn get_watchlist(&self) -> AppResult<Vec<MoviePayload>>;
}
