//! Local catalog store.
//!
//! Wraps the SQLite database with typed reads and upserts for the anime,
//! genres and characters tables. Every committed write publishes a
//! [`StoreChange`] naming the tables it touched; live queries subscribe to
//! these and re-read when a relevant table changes.

use crate::db::Database;
use crate::models::{AnimeRecord, CharacterRecord, GenreRecord};
use anyhow::{anyhow, Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

/// Buffered change notifications per subscriber
const CHANGE_CAPACITY: usize = 64;

const ANIME_COLUMNS: &str = "mal_id, title, title_english, title_japanese, image_url, \
     synopsis, score, episodes, status, aired, genre_ids, trailer_youtube_id, trailer_url, \
     trailer_embed_url, trailer_image_url, is_favorite, last_updated";

/// Catalog tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Anime,
    Genres,
    Characters,
}

/// Notification published after a committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    tables: Vec<Table>,
}

impl StoreChange {
    fn new(tables: &[Table]) -> Self {
        Self {
            tables: tables.to_vec(),
        }
    }

    /// Whether the write touched any of `tables`
    pub fn touches_any(&self, tables: &[Table]) -> bool {
        self.tables.iter().any(|table| tables.contains(table))
    }
}

/// Row counts for the local catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub anime: usize,
    pub favorites: usize,
    pub genres: usize,
    pub characters: usize,
}

/// SQLite-backed catalog store with change notifications
pub struct CatalogStore {
    db: Mutex<Database>,
    changes: broadcast::Sender<StoreChange>,
}

impl CatalogStore {
    /// Create a store over an opened database
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            db: Mutex::new(db),
            changes,
        }
    }

    /// Open or create the store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Subscribe to change notifications
    ///
    /// Subscribe before the first read so no write between the read and the
    /// subscription is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("Catalog store lock poisoned"))
    }

    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    fn notify(&self, tables: &[Table]) {
        // No subscribers is not an error
        let _ = self.changes.send(StoreChange::new(tables));
    }

    // ========== Reads ==========

    /// All cached anime, most recently updated first
    pub fn all_anime(&self) -> Result<Vec<AnimeRecord>> {
        let db = self.lock()?;
        query_anime(
            db.conn(),
            &format!(
                "SELECT {} FROM anime ORDER BY last_updated DESC, mal_id ASC",
                ANIME_COLUMNS
            ),
        )
    }

    /// Favorited anime, most recently updated first
    pub fn favorite_anime(&self) -> Result<Vec<AnimeRecord>> {
        let db = self.lock()?;
        query_anime(
            db.conn(),
            &format!(
                "SELECT {} FROM anime WHERE is_favorite = 1 ORDER BY last_updated DESC, mal_id ASC",
                ANIME_COLUMNS
            ),
        )
    }

    /// Single anime by MAL id
    pub fn anime_by_id(&self, mal_id: u32) -> Result<Option<AnimeRecord>> {
        let db = self.lock()?;
        find_anime(db.conn(), mal_id)
    }

    /// Genres with the given ids (unknown ids are skipped)
    pub fn genres_by_ids(&self, ids: &[u32]) -> Result<Vec<GenreRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(&format!(
            "SELECT mal_id, name FROM genres WHERE mal_id IN ({})",
            placeholders
        ))?;
        let genres = stmt
            .query_map(params_from_iter(ids.iter()), row_to_genre)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query genres")?;
        Ok(genres)
    }

    /// Characters of one anime in API order
    pub fn characters_for(&self, anime_id: u32) -> Result<Vec<CharacterRecord>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT mal_id, anime_id, name, image_url, role FROM characters
             WHERE anime_id = ?1 ORDER BY position, mal_id",
        )?;
        let characters = stmt
            .query_map([anime_id], |row| {
                Ok(CharacterRecord {
                    mal_id: row.get(0)?,
                    anime_id: row.get(1)?,
                    name: row.get(2)?,
                    image_url: row.get(3)?,
                    role: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query characters")?;
        Ok(characters)
    }

    /// Row counts per table
    pub fn stats(&self) -> Result<StoreStats> {
        let db = self.lock()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = db.conn().query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            anime: count("SELECT COUNT(*) FROM anime")?,
            favorites: count("SELECT COUNT(*) FROM anime WHERE is_favorite = 1")?,
            genres: count("SELECT COUNT(*) FROM genres")?,
            characters: count("SELECT COUNT(*) FROM characters")?,
        })
    }

    // ========== Writes ==========

    /// Store one fetched page: genres first, then anime, in one transaction
    ///
    /// Publishes a single change for both tables.
    pub fn save_page(
        &self,
        genres: &[GenreRecord],
        anime: Vec<AnimeRecord>,
    ) -> Result<Vec<AnimeRecord>> {
        let written = self.write(|tx| {
            upsert_genres(tx, genres)?;
            anime
                .into_iter()
                .map(|record| upsert_anime(tx, record))
                .collect::<Result<Vec<_>>>()
        })?;

        debug!(anime = written.len(), genres = genres.len(), "Saved catalog page");
        self.notify(&[Table::Genres, Table::Anime]);
        Ok(written)
    }

    /// Store one fetched detail in one transaction
    ///
    /// When `characters` is `Some`, the anime's character set is replaced.
    pub fn save_detail(
        &self,
        anime: AnimeRecord,
        genres: &[GenreRecord],
        characters: Option<&[CharacterRecord]>,
    ) -> Result<AnimeRecord> {
        let mal_id = anime.mal_id;
        let written = self.write(|tx| {
            let written = upsert_anime(tx, anime)?;
            upsert_genres(tx, genres)?;
            if let Some(characters) = characters {
                replace_characters(tx, mal_id, characters)?;
            }
            Ok(written)
        })?;

        if characters.is_some() {
            self.notify(&[Table::Anime, Table::Genres, Table::Characters]);
        } else {
            self.notify(&[Table::Anime, Table::Genres]);
        }
        Ok(written)
    }

    /// Delete all characters of `anime_id` and insert `characters`
    pub fn replace_characters(&self, anime_id: u32, characters: &[CharacterRecord]) -> Result<()> {
        self.write(|tx| replace_characters(tx, anime_id, characters))?;
        self.notify(&[Table::Characters]);
        Ok(())
    }

    /// Flip the favorite flag of one anime
    ///
    /// Returns the new flag, or `None` if the anime is not cached.
    pub fn toggle_favorite(&self, mal_id: u32) -> Result<Option<bool>> {
        let toggled = self.write(|tx| {
            let current: Option<bool> = tx
                .query_row(
                    "SELECT is_favorite FROM anime WHERE mal_id = ?1",
                    [mal_id],
                    |row| row.get(0),
                )
                .optional()?;

            match current {
                Some(current) => {
                    tx.execute(
                        "UPDATE anime SET is_favorite = ?1 WHERE mal_id = ?2",
                        params![!current, mal_id],
                    )?;
                    Ok(Some(!current))
                }
                None => Ok(None),
            }
        })?;

        if let Some(is_favorite) = toggled {
            debug!(mal_id = mal_id, is_favorite = is_favorite, "Toggled favorite");
            self.notify(&[Table::Anime]);
        }
        Ok(toggled)
    }

    /// Delete every non-favorited anime and its characters
    ///
    /// Returns the number of anime removed.
    pub fn clear_non_favorites(&self) -> Result<usize> {
        let removed = self.write(|tx| {
            tx.execute("DELETE FROM anime WHERE is_favorite = 0", [])
                .context("Failed to clear cached anime")
        })?;

        info!(removed = removed, "Cleared non-favorite anime");
        if removed > 0 {
            self.notify(&[Table::Anime, Table::Characters]);
        }
        Ok(removed)
    }
}

/// Wait for a change touching any of `tables`
///
/// Returns `false` once the store has gone away. A lagged receiver counts as
/// a change, since the caller re-reads anyway.
pub async fn wait_for_change(
    changes: &mut broadcast::Receiver<StoreChange>,
    tables: &[Table],
) -> bool {
    loop {
        match changes.recv().await {
            Ok(change) if change.touches_any(tables) => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped = skipped, "Change subscriber lagged");
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

fn query_anime(conn: &Connection, sql: &str) -> Result<Vec<AnimeRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let anime = stmt
        .query_map([], row_to_anime)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query anime")?;
    Ok(anime)
}

fn find_anime(conn: &Connection, mal_id: u32) -> Result<Option<AnimeRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM anime WHERE mal_id = ?1", ANIME_COLUMNS),
        [mal_id],
        row_to_anime,
    )
    .optional()
    .context("Failed to query anime by id")
}

fn upsert_genres(conn: &Connection, genres: &[GenreRecord]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO genres (mal_id, name) VALUES (?1, ?2)
         ON CONFLICT(mal_id) DO UPDATE SET name = excluded.name",
    )?;
    for genre in genres {
        stmt.execute(params![genre.mal_id, genre.name])
            .with_context(|| format!("Failed to upsert genre {}", genre.mal_id))?;
    }
    Ok(())
}

fn upsert_anime(conn: &Connection, mut record: AnimeRecord) -> Result<AnimeRecord> {
    let stored_favorite: Option<bool> = conn
        .query_row(
            "SELECT is_favorite FROM anime WHERE mal_id = ?1",
            [record.mal_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(is_favorite) = stored_favorite {
        record.is_favorite = is_favorite;
    }

    let genre_ids = serde_json::to_string(&record.genre_ids)?;

    conn.prepare_cached(&format!(
        "INSERT INTO anime ({}) VALUES (
             ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17
         )
         ON CONFLICT(mal_id) DO UPDATE SET
             title = excluded.title,
             title_english = excluded.title_english,
             title_japanese = excluded.title_japanese,
             image_url = excluded.image_url,
             synopsis = excluded.synopsis,
             score = excluded.score,
             episodes = excluded.episodes,
             status = excluded.status,
             aired = excluded.aired,
             genre_ids = excluded.genre_ids,
             trailer_youtube_id = excluded.trailer_youtube_id,
             trailer_url = excluded.trailer_url,
             trailer_embed_url = excluded.trailer_embed_url,
             trailer_image_url = excluded.trailer_image_url,
             is_favorite = excluded.is_favorite,
             last_updated = excluded.last_updated",
        ANIME_COLUMNS
    ))?
    .execute(params![
        record.mal_id,
        record.title,
        record.title_english,
        record.title_japanese,
        record.image_url,
        record.synopsis,
        record.score,
        record.episodes,
        record.status,
        record.aired,
        genre_ids,
        record.trailer_youtube_id,
        record.trailer_url,
        record.trailer_embed_url,
        record.trailer_image_url,
        record.is_favorite,
        record.last_updated,
    ])
    .with_context(|| format!("Failed to upsert anime {}", record.mal_id))?;

    Ok(record)
}

fn replace_characters(
    conn: &Connection,
    anime_id: u32,
    characters: &[CharacterRecord],
) -> Result<()> {
    conn.execute("DELETE FROM characters WHERE anime_id = ?1", [anime_id])
        .context("Failed to delete characters")?;

    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO characters (anime_id, mal_id, name, image_url, role, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, character) in characters.iter().enumerate() {
        stmt.execute(params![
            anime_id,
            character.mal_id,
            character.name,
            character.image_url,
            character.role,
            position as i64,
        ])
        .with_context(|| format!("Failed to insert character {}", character.mal_id))?;
    }

    debug!(anime_id = anime_id, count = characters.len(), "Replaced characters");
    Ok(())
}

fn row_to_anime(row: &Row) -> rusqlite::Result<AnimeRecord> {
    let genre_ids: String = row.get(10)?;
    let genre_ids = serde_json::from_str(&genre_ids)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(AnimeRecord {
        mal_id: row.get(0)?,
        title: row.get(1)?,
        title_english: row.get(2)?,
        title_japanese: row.get(3)?,
        image_url: row.get(4)?,
        synopsis: row.get(5)?,
        score: row.get(6)?,
        episodes: row.get(7)?,
        status: row.get(8)?,
        aired: row.get(9)?,
        genre_ids,
        trailer_youtube_id: row.get(11)?,
        trailer_url: row.get(12)?,
        trailer_embed_url: row.get(13)?,
        trailer_image_url: row.get(14)?,
        is_favorite: row.get(15)?,
        last_updated: row.get(16)?,
    })
}

fn row_to_genre(row: &Row) -> rusqlite::Result<GenreRecord> {
    Ok(GenreRecord {
        mal_id: row.get(0)?,
        name: row.get(1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_store() -> Result<(TempDir, CatalogStore)> {
        let temp_dir = TempDir::new()?;
        let store = CatalogStore::open(temp_dir.path().join("anime.db"))?;
        Ok((temp_dir, store))
    }

    fn anime(mal_id: u32, title: &str) -> AnimeRecord {
        AnimeRecord {
            mal_id,
            title: title.to_string(),
            title_english: None,
            title_japanese: None,
            image_url: format!("https://cdn.myanimelist.net/images/anime/{}.jpg", mal_id),
            synopsis: Some("A synopsis.".to_string()),
            score: Some(8.5),
            episodes: Some(12),
            status: Some("Finished Airing".to_string()),
            aired: Some("Apr 2009 to Jul 2010".to_string()),
            genre_ids: vec![1, 4],
            trailer_youtube_id: Some("abc123".to_string()),
            trailer_url: Some("https://youtube.com/watch?v=abc123".to_string()),
            trailer_embed_url: None,
            trailer_image_url: None,
            is_favorite: false,
            last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn character(mal_id: u32, anime_id: u32, name: &str) -> CharacterRecord {
        CharacterRecord {
            mal_id,
            anime_id,
            name: name.to_string(),
            image_url: None,
            role: Some("Main".to_string()),
        }
    }

    #[test]
    fn test_upsert_and_read_back() -> Result<()> {
        let (_dir, store) = open_store()?;

        let record = anime(1, "Cowboy Bebop");
        store.save_page(&[], vec![record.clone()])?;

        assert_eq!(store.anime_by_id(1)?, Some(record));
        assert_eq!(store.anime_by_id(2)?, None);
        Ok(())
    }

    #[test]
    fn test_upsert_preserves_favorite() -> Result<()> {
        let (_dir, store) = open_store()?;

        store.save_page(&[], vec![anime(1, "Cowboy Bebop")])?;
        assert_eq!(store.toggle_favorite(1)?, Some(true));

        let mut refreshed = anime(1, "Cowboy Bebop (Remastered)");
        refreshed.is_favorite = false;
        let written = store.save_page(&[], vec![refreshed])?;
        assert!(written[0].is_favorite);

        let stored = store.anime_by_id(1)?.unwrap();
        assert!(stored.is_favorite);
        assert_eq!(stored.title, "Cowboy Bebop (Remastered)");
        Ok(())
    }

    #[test]
    fn test_toggle_twice_restores_flag() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(&[], vec![anime(1, "Cowboy Bebop")])?;

        assert_eq!(store.toggle_favorite(1)?, Some(true));
        assert_eq!(store.toggle_favorite(1)?, Some(false));
        assert!(!store.anime_by_id(1)?.unwrap().is_favorite);
        Ok(())
    }

    #[test]
    fn test_toggle_unknown_anime() -> Result<()> {
        let (_dir, store) = open_store()?;
        assert_eq!(store.toggle_favorite(42)?, None);
        Ok(())
    }

    #[test]
    fn test_clear_keeps_favorites() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(&[], vec![anime(1, "A"), anime(2, "B")])?;
        store.toggle_favorite(1)?;
        store.replace_characters(2, &[character(10, 2, "Spike")])?;

        assert_eq!(store.clear_non_favorites()?, 1);

        let remaining: Vec<u32> = store.all_anime()?.iter().map(|a| a.mal_id).collect();
        assert_eq!(remaining, vec![1]);
        assert!(store.characters_for(2)?.is_empty());
        assert_eq!(store.favorite_anime()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_replace_characters_is_scoped_to_owner() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(&[], vec![anime(1, "X"), anime(2, "Y")])?;

        // Same character id under both anime
        store.replace_characters(1, &[character(10, 1, "Spike"), character(11, 1, "Jet")])?;
        store.replace_characters(2, &[character(10, 2, "Spike")])?;

        store.replace_characters(1, &[character(12, 1, "Faye")])?;

        let x: Vec<u32> = store.characters_for(1)?.iter().map(|c| c.mal_id).collect();
        let y: Vec<u32> = store.characters_for(2)?.iter().map(|c| c.mal_id).collect();
        assert_eq!(x, vec![12]);
        assert_eq!(y, vec![10]);
        Ok(())
    }

    #[test]
    fn test_characters_keep_api_order() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(&[], vec![anime(1, "X")])?;
        store.replace_characters(
            1,
            &[character(30, 1, "C"), character(10, 1, "A"), character(20, 1, "B")],
        )?;

        let names: Vec<String> = store.characters_for(1)?.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        Ok(())
    }

    #[test]
    fn test_genres_by_ids() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(
            &[
                GenreRecord { mal_id: 1, name: "Action".to_string() },
                GenreRecord { mal_id: 4, name: "Comedy".to_string() },
                GenreRecord { mal_id: 8, name: "Drama".to_string() },
            ],
            Vec::new(),
        )?;

        let mut found = store.genres_by_ids(&[1, 8, 99])?;
        found.sort_by_key(|g| g.mal_id);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].name, "Drama");
        assert!(store.genres_by_ids(&[])?.is_empty());
        assert_eq!(store.stats()?.genres, 3);
        Ok(())
    }

    #[test]
    fn test_all_anime_orders_by_last_updated() -> Result<()> {
        let (_dir, store) = open_store()?;
        let mut older = anime(1, "Older");
        older.last_updated = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        store.save_page(&[], vec![older, anime(2, "Newer")])?;

        let ids: Vec<u32> = store.all_anime()?.iter().map(|a| a.mal_id).collect();
        assert_eq!(ids, vec![2, 1]);
        Ok(())
    }

    #[test]
    fn test_save_detail_replaces_characters() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(&[], vec![anime(1, "X")])?;
        store.replace_characters(1, &[character(10, 1, "Old")])?;

        let genres = [GenreRecord { mal_id: 1, name: "Action".to_string() }];
        store.save_detail(anime(1, "X"), &genres, Some(&[character(11, 1, "New")][..]))?;
        assert_eq!(store.characters_for(1)?[0].name, "New");

        // Without a character list the stored set is kept
        store.save_detail(anime(1, "X"), &genres, None)?;
        assert_eq!(store.characters_for(1)?[0].name, "New");
        Ok(())
    }

    #[test]
    fn test_stats() -> Result<()> {
        let (_dir, store) = open_store()?;
        assert_eq!(store.stats()?, StoreStats::default());

        store.save_page(
            &[GenreRecord { mal_id: 1, name: "Action".to_string() }],
            vec![anime(1, "A"), anime(2, "B")],
        )?;
        store.toggle_favorite(2)?;
        store.replace_characters(1, &[character(10, 1, "Spike")])?;

        let stats = store.stats()?;
        assert_eq!(stats.anime, 2);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.genres, 1);
        assert_eq!(stats.characters, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_page_publishes_one_change() -> Result<()> {
        let (_dir, store) = open_store()?;
        let mut changes = store.subscribe();

        store.save_page(
            &[GenreRecord { mal_id: 1, name: "Action".to_string() }],
            vec![anime(1, "A")],
        )?;

        let change = changes.recv().await?;
        assert!(change.touches_any(&[Table::Anime]));
        assert!(change.touches_any(&[Table::Genres]));
        assert!(!change.touches_any(&[Table::Characters]));
        assert!(changes.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_wait_for_change_filters_tables() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.save_page(&[], vec![anime(1, "A")])?;
        let mut changes = store.subscribe();

        store.replace_characters(1, &[character(10, 1, "Spike")])?;
        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            wait_for_change(&mut changes, &[Table::Anime]),
        )
        .await;
        assert!(waited.is_err());

        store.toggle_favorite(1)?;
        assert!(wait_for_change(&mut changes, &[Table::Anime]).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_noop_writes_do_not_notify() -> Result<()> {
        let (_dir, store) = open_store()?;
        let mut changes = store.subscribe();

        store.toggle_favorite(7)?;
        store.clear_non_favorites()?;

        assert!(changes.try_recv().is_err());
        Ok(())
    }
}
