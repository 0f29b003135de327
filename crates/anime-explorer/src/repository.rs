//! Offline-first anime repository.
//!
//! Every read first emits what the local store holds, then, when the network
//! is reachable, refreshes from the remote catalog and writes the result back.
//! The write wakes the live query, which emits again with the fresh data.
//! Remote and local failures are logged and never surface to the caller.

use crate::api::CatalogApi;
use crate::connectivity::Connectivity;
use crate::domain::Anime;
use crate::mapper;
use anyhow::Result;
use async_stream::stream;
use chrono::Utc;
use futures::Stream;
use shared::store::wait_for_change;
use shared::{CatalogStore, GenreRecord, StoreStats, Table};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tables a list view depends on
const LIST_TABLES: &[Table] = &[Table::Anime, Table::Genres];

/// Tables a detail view depends on
const DETAIL_TABLES: &[Table] = &[Table::Anime, Table::Genres, Table::Characters];

/// Default page size for remote search
pub const DEFAULT_SEARCH_LIMIT: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListScope {
    All,
    Favorites,
}

/// Synchronizes the remote catalog into the local store and serves live reads
#[derive(Clone)]
pub struct AnimeRepository {
    api: Arc<dyn CatalogApi>,
    store: Arc<CatalogStore>,
    connectivity: Arc<dyn Connectivity>,
    search_limit: u32,
}

impl AnimeRepository {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        store: Arc<CatalogStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            api,
            store,
            connectivity,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Page size used for remote search
    pub fn with_search_limit(mut self, search_limit: u32) -> Self {
        self.search_limit = search_limit;
        self
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Live list of cached anime, refreshed once from the top-anime endpoint
    ///
    /// Emits the cached list immediately. If online and the fetch succeeds,
    /// emits again with the stored page merged in, then keeps re-emitting on
    /// every later store change.
    pub fn top_anime(&self, page: u32, limit: u32) -> impl Stream<Item = Vec<Anime>> + Send + 'static {
        let this = self.clone();
        stream! {
            let mut changes = this.store.subscribe();

            match this.load_list(ListScope::All) {
                Ok(anime) => yield anime,
                Err(e) => {
                    error!(error = %e, "Failed to read cached anime");
                    yield Vec::new();
                    return;
                }
            }

            this.refresh_top_anime(page, limit).await;

            while wait_for_change(&mut changes, LIST_TABLES).await {
                match this.load_list(ListScope::All) {
                    Ok(anime) => yield anime,
                    Err(e) => {
                        error!(error = %e, "Failed to read cached anime");
                        yield Vec::new();
                        return;
                    }
                }
            }
        }
    }

    /// Live detail of one anime, refreshed once from the full-detail endpoint
    ///
    /// Nothing is emitted until the anime is cached, and a re-read equal to
    /// the previous emission is skipped.
    pub fn anime_detail(&self, mal_id: u32) -> impl Stream<Item = Anime> + Send + 'static {
        let this = self.clone();
        stream! {
            let mut changes = this.store.subscribe();
            let mut last: Option<Anime> = None;

            match this.cached_detail(mal_id) {
                Ok(Some(anime)) => {
                    last = Some(anime.clone());
                    yield anime;
                }
                Ok(None) => debug!(mal_id = mal_id, "Anime not cached yet"),
                Err(e) => {
                    error!(mal_id = mal_id, error = %e, "Failed to read cached anime detail");
                    return;
                }
            }

            this.refresh_anime_detail(mal_id).await;

            while wait_for_change(&mut changes, DETAIL_TABLES).await {
                match this.cached_detail(mal_id) {
                    // Writes to other anime wake this stream too
                    Ok(Some(anime)) if last.as_ref() == Some(&anime) => {}
                    Ok(Some(anime)) => {
                        last = Some(anime.clone());
                        yield anime;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(mal_id = mal_id, error = %e, "Failed to read cached anime detail");
                        return;
                    }
                }
            }
        }
    }

    /// Search once: remotely when online, otherwise over cached titles
    ///
    /// Online results are cached and emitted straight from the response.
    /// A failed remote search falls back to the cached titles.
    pub fn search_anime(&self, query: &str, page: u32) -> impl Stream<Item = Vec<Anime>> + Send + 'static {
        let this = self.clone();
        let query = query.trim().to_string();
        stream! {
            if query.is_empty() {
                yield Vec::new();
                return;
            }

            if this.is_online().await {
                match this.search_remote(&query, page).await {
                    Ok(results) => {
                        yield results;
                        return;
                    }
                    Err(e) => warn!(query = %query, error = %e, "Remote search failed, searching cache"),
                }
            }

            yield this.search_cached(&query);
        }
    }

    /// Live list of every cached anime
    pub fn cached_anime(&self) -> impl Stream<Item = Vec<Anime>> + Send + 'static {
        self.watch_list(ListScope::All)
    }

    /// Live list of favorited anime
    pub fn favorite_anime(&self) -> impl Stream<Item = Vec<Anime>> + Send + 'static {
        self.watch_list(ListScope::Favorites)
    }

    /// Flip the favorite flag; `None` when the anime is not cached
    pub fn toggle_favorite(&self, mal_id: u32) -> Result<Option<bool>> {
        let toggled = self.store.toggle_favorite(mal_id)?;
        match toggled {
            Some(is_favorite) => info!(mal_id = mal_id, is_favorite = is_favorite, "Toggled favorite"),
            None => warn!(mal_id = mal_id, "Cannot toggle favorite of uncached anime"),
        }
        Ok(toggled)
    }

    /// Purge every non-favorited anime; returns how many were removed
    pub fn clear_cache(&self) -> Result<usize> {
        self.store.clear_non_favorites()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    fn watch_list(&self, scope: ListScope) -> impl Stream<Item = Vec<Anime>> + Send + 'static {
        let this = self.clone();
        stream! {
            let mut changes = this.store.subscribe();
            loop {
                match this.load_list(scope) {
                    Ok(anime) => yield anime,
                    Err(e) => {
                        error!(error = %e, "Failed to read cached anime");
                        yield Vec::new();
                        return;
                    }
                }

                if !wait_for_change(&mut changes, LIST_TABLES).await {
                    return;
                }
            }
        }
    }

    async fn is_online(&self) -> bool {
        let connectivity = Arc::clone(&self.connectivity);
        tokio::task::spawn_blocking(move || connectivity.is_online())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Connectivity check panicked");
                false
            })
    }

    fn load_list(&self, scope: ListScope) -> Result<Vec<Anime>> {
        let records = match scope {
            ListScope::All => self.store.all_anime()?,
            ListScope::Favorites => self.store.favorite_anime()?,
        };
        let genres = self
            .store
            .genres_by_ids(&mapper::referenced_genre_ids(&records))?;

        Ok(mapper::records_to_anime(records, &mapper::genre_lookup(genres)))
    }

    /// Current cached list, without refreshing
    pub fn cached_list(&self) -> Result<Vec<Anime>> {
        self.load_list(ListScope::All)
    }

    /// Current cached detail with genres and characters, without refreshing
    pub fn cached_detail(&self, mal_id: u32) -> Result<Option<Anime>> {
        let Some(record) = self.store.anime_by_id(mal_id)? else {
            return Ok(None);
        };
        let genres = self.store.genres_by_ids(&record.genre_ids)?;
        let characters = self.store.characters_for(mal_id)?;

        Ok(Some(mapper::record_to_anime(
            record,
            &mapper::genre_lookup(genres),
            characters,
        )))
    }

    /// Fetch one page of top anime and store it
    ///
    /// Returns whether fresh data was written. Offline, remote failures and
    /// store failures all return false after logging.
    pub async fn refresh_top_anime(&self, page: u32, limit: u32) -> bool {
        if !self.is_online().await {
            debug!(page = page, "Offline, serving cached top anime");
            return false;
        }

        let response = match self.api.top_anime(page, limit).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    page = page,
                    rate_limited = e.is_rate_limited(),
                    error = %e,
                    "Failed to fetch top anime, serving cache"
                );
                return false;
            }
        };

        let genres = mapper::page_genres(&response.data);
        let records = mapper::entries_to_records(&response.data, Utc::now());
        match self.store.save_page(&genres, records) {
            Ok(saved) => {
                info!(
                    page = page,
                    count = saved.len(),
                    has_next_page = response.pagination.has_next_page,
                    "Refreshed top anime"
                );
                true
            }
            Err(e) => {
                error!(page = page, error = %e, "Failed to store top anime");
                false
            }
        }
    }

    /// Fetch full detail and characters for one anime and store them
    ///
    /// A failed character fetch keeps the stored characters.
    pub async fn refresh_anime_detail(&self, mal_id: u32) -> bool {
        if !self.is_online().await {
            debug!(mal_id = mal_id, "Offline, serving cached detail");
            return false;
        }

        let entry = match self.api.anime_full(mal_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    mal_id = mal_id,
                    rate_limited = e.is_rate_limited(),
                    error = %e,
                    "Failed to fetch anime detail, serving cache"
                );
                return false;
            }
        };

        let characters = match self.api.anime_characters(mal_id).await {
            Ok(characters) => Some(mapper::characters_to_records(mal_id, &characters)),
            Err(e) => {
                warn!(mal_id = mal_id, error = %e, "Failed to fetch characters, keeping cached ones");
                None
            }
        };

        let record = mapper::entry_to_record(&entry, Utc::now());
        let genres: Vec<GenreRecord> = entry.genres.iter().map(mapper::genre_to_record).collect();

        match self.store.save_detail(record, &genres, characters.as_deref()) {
            Ok(_) => {
                info!(mal_id = mal_id, "Refreshed anime detail");
                true
            }
            Err(e) => {
                error!(mal_id = mal_id, error = %e, "Failed to store anime detail");
                false
            }
        }
    }

    async fn search_remote(&self, query: &str, page: u32) -> Result<Vec<Anime>> {
        let response = self.api.search_anime(query, page, self.search_limit).await?;

        let genres = mapper::page_genres(&response.data);
        let records = mapper::entries_to_records(&response.data, Utc::now());
        let records = match self.store.save_page(&genres, records.clone()) {
            Ok(saved) => saved,
            Err(e) => {
                error!(query = %query, error = %e, "Failed to cache search results");
                records
            }
        };

        info!(query = %query, count = records.len(), "Search returned results");
        Ok(mapper::records_to_anime(records, &mapper::genre_lookup(genres)))
    }

    fn search_cached(&self, query: &str) -> Vec<Anime> {
        let result = self.store.all_anime().and_then(|records| {
            let matches: Vec<_> = records
                .into_iter()
                .filter(|record| record.matches_title(query))
                .collect();
            let genres = self
                .store
                .genres_by_ids(&mapper::referenced_genre_ids(&matches))?;
            Ok(mapper::records_to_anime(matches, &mapper::genre_lookup(genres)))
        });

        match result {
            Ok(anime) => {
                debug!(query = %query, count = anime.len(), "Searched cached anime");
                anime
            }
            Err(e) => {
                error!(query = %query, error = %e, "Failed to search cached anime");
                Vec::new()
            }
        }
    }
}
