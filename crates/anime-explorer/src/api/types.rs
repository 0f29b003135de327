//! Jikan API v4 response types.
//!
//! Only the fields the catalog stores are modelled; everything else in the
//! payload is ignored. Nullable or sometimes-missing fields default.

use serde::{Deserialize, Serialize};

/// Paginated list envelope (`/top/anime`, `/anime?q=`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeListResponse {
    pub data: Vec<AnimeEntry>,
    pub pagination: Pagination,
}

/// Single item envelope (`/anime/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeResponse {
    pub data: AnimeEntry,
}

/// Character list envelope (`/anime/{id}/characters`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharactersResponse {
    pub data: Vec<CharacterEntry>,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub last_visible_page: u32,
    pub has_next_page: bool,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub items: Option<PaginationItems>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// Anime as returned by list, search and full-detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeEntry {
    pub mal_id: u32,
    pub images: AnimeImages,
    #[serde(default)]
    pub trailer: Option<Trailer>,

    // Titles
    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,

    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub aired: Option<Aired>,
    #[serde(default)]
    pub genres: Vec<MalEntity>,
}

/// Anime images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeImages {
    pub jpg: ImageSet,
    #[serde(default)]
    pub webp: Option<ImageSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub small_image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
}

/// YouTube trailer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    #[serde(default)]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub images: Option<TrailerImages>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailerImages {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub maximum_image_url: Option<String>,
}

/// Aired dates; only the preformatted string is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aired {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
}

/// MAL entity (genre, studio, producer, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalEntity {
    pub mal_id: u32,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    pub name: String,
}

/// One entry of an anime's character list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterEntry {
    pub character: CharacterInfo,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub images: Option<CharacterImages>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterImages {
    #[serde(default)]
    pub jpg: ImageSet,
}
