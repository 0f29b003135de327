//! Jikan API v4 client implementation.
//!
//! [`CatalogApi`] is the seam the synchronizer talks to; [`JikanClient`] is
//! the rate-limited HTTP implementation.

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod types;

pub use client::JikanClient;
pub use error::ApiError;
pub use rate_limiter::RateLimiter;
pub use types::*;

use async_trait::async_trait;

/// Remote catalog operations
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET /top/anime?page&limit`
    async fn top_anime(&self, page: u32, limit: u32) -> Result<AnimeListResponse, ApiError>;

    /// `GET /anime/{id}/full`
    async fn anime_full(&self, mal_id: u32) -> Result<AnimeEntry, ApiError>;

    /// `GET /anime?q&page&limit`
    async fn search_anime(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<AnimeListResponse, ApiError>;

    /// `GET /anime/{id}/characters`
    async fn anime_characters(&self, mal_id: u32) -> Result<Vec<CharacterEntry>, ApiError>;
}
