//! Storage records for the local catalog.
//!
//! These mirror the three SQLite tables one-to-one. Display models with
//! joined genres and characters live in the `anime-explorer` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anime row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeRecord {
    pub mal_id: u32,

    // Titles
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,

    pub image_url: String,
    pub synopsis: Option<String>,
    pub score: Option<f64>,
    pub episodes: Option<u32>,
    pub status: Option<String>,
    pub aired: Option<String>,

    /// Genre ids in API order (stored as a JSON array)
    pub genre_ids: Vec<u32>,

    // Trailer
    pub trailer_youtube_id: Option<String>,
    pub trailer_url: Option<String>,
    pub trailer_embed_url: Option<String>,
    pub trailer_image_url: Option<String>,

    pub is_favorite: bool,
    pub last_updated: DateTime<Utc>,
}

impl AnimeRecord {
    /// Case-insensitive substring match against the three title fields
    pub fn matches_title(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        std::iter::once(Some(&self.title))
            .chain([self.title_english.as_ref(), self.title_japanese.as_ref()])
            .flatten()
            .any(|title| title.to_lowercase().contains(&needle))
    }
}

/// Genre row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenreRecord {
    pub mal_id: u32,
    pub name: String,
}

/// Character row, owned by one anime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub mal_id: u32,
    pub anime_id: u32,
    pub name: String,
    pub image_url: Option<String>,
    pub role: Option<String>,
}
