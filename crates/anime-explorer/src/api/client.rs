//! Jikan API client with client-side rate limiting.

use super::error::ApiError;
use super::rate_limiter::RateLimiter;
use super::types::*;
use super::CatalogApi;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::config::ApiConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Jikan API v4 client
pub struct JikanClient {
    /// HTTP client
    client: Client,
    /// Base URL for Jikan API
    base_url: String,
    /// Rate limiter
    rate_limiter: RateLimiter,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(
        base_url: String,
        timeout: Duration,
        connect_timeout: Duration,
        user_agent: &str,
        requests_per_second: f64,
        requests_per_minute: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(requests_per_second, requests_per_minute),
        })
    }

    /// Create a client from the `[api]` configuration section
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
            Duration::from_secs(config.connect_timeout_seconds),
            &config.user_agent,
            config.rate_limit.requests_per_second,
            config.rate_limit.requests_per_minute,
        )
    }

    /// Full URL for an endpoint path
    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make a rate-limited GET request and decode the JSON body
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(endpoint);

        self.rate_limiter.acquire().await;
        debug!(url = %url, query = ?query, "Making API request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Request error");
                ApiError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(url = %url, status = %status, error = %body, "Request failed");
            return Err(ApiError::Status { status, body });
        }

        let data = response.json::<T>().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to parse response");
            ApiError::Decode(e)
        })?;

        debug!(url = %url, "Request successful");
        Ok(data)
    }
}

#[async_trait]
impl CatalogApi for JikanClient {
    async fn top_anime(&self, page: u32, limit: u32) -> Result<AnimeListResponse, ApiError> {
        info!(page = page, limit = limit, "Fetching top anime");
        self.get(
            "/top/anime",
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn anime_full(&self, mal_id: u32) -> Result<AnimeEntry, ApiError> {
        info!(mal_id = mal_id, "Fetching anime details");
        let response: AnimeResponse = self.get(&format!("/anime/{}/full", mal_id), &[]).await?;
        Ok(response.data)
    }

    async fn search_anime(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<AnimeListResponse, ApiError> {
        info!(query = %query, page = page, "Searching anime");
        self.get(
            "/anime",
            &[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn anime_characters(&self, mal_id: u32) -> Result<Vec<CharacterEntry>, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime characters");
        let response: CharactersResponse = self
            .get(&format!("/anime/{}/characters", mal_id), &[])
            .await?;
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = JikanClient::from_config(&shared::Config::default().api);
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash() -> Result<()> {
        let client = JikanClient::new(
            "https://api.jikan.moe/v4/".to_string(),
            Duration::from_secs(30),
            Duration::from_secs(30),
            "test",
            3.0,
            60,
        )?;
        assert_eq!(client.url("/top/anime"), "https://api.jikan.moe/v4/top/anime");
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() -> Result<()> {
        // Nothing listens on the discard port
        let client = JikanClient::new(
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
            Duration::from_secs(2),
            "test",
            100.0,
            100,
        )?;

        let err = client.top_anime(1, 20).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        Ok(())
    }
}
