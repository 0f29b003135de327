//! Pure translation between wire, storage and display forms.

use crate::api::{AnimeEntry, CharacterEntry, MalEntity};
use crate::domain::{Anime, Character, Genre, Trailer};
use chrono::{DateTime, Duration, Utc};
use shared::{AnimeRecord, CharacterRecord, GenreRecord};
use std::collections::{HashMap, HashSet};

// ========== Wire -> storage ==========

/// Storage record for a fetched anime, stamped with `now`
///
/// The favorite flag starts false; the store carries the stored flag forward.
pub fn entry_to_record(entry: &AnimeEntry, now: DateTime<Utc>) -> AnimeRecord {
    let trailer = entry.trailer.as_ref();

    AnimeRecord {
        mal_id: entry.mal_id,
        title: entry.title.clone(),
        title_english: entry.title_english.clone(),
        title_japanese: entry.title_japanese.clone(),
        image_url: entry.images.jpg.image_url.clone().unwrap_or_default(),
        synopsis: entry.synopsis.clone(),
        score: entry.score,
        episodes: entry.episodes,
        status: entry.status.clone(),
        aired: entry.aired.as_ref().and_then(|aired| aired.string.clone()),
        genre_ids: entry.genres.iter().map(|genre| genre.mal_id).collect(),
        trailer_youtube_id: trailer.and_then(|t| t.youtube_id.clone()),
        trailer_url: trailer.and_then(|t| t.url.clone()),
        trailer_embed_url: trailer.and_then(|t| t.embed_url.clone()),
        trailer_image_url: trailer
            .and_then(|t| t.images.as_ref())
            .and_then(|images| images.image_url.clone()),
        is_favorite: false,
        last_updated: now,
    }
}

/// Storage records for one fetched page
///
/// Each record is stamped one microsecond earlier than the one before it, so
/// reading back by `last_updated` keeps the page's order.
pub fn entries_to_records(entries: &[AnimeEntry], now: DateTime<Utc>) -> Vec<AnimeRecord> {
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            entry_to_record(entry, now - Duration::microseconds(position as i64))
        })
        .collect()
}

pub fn genre_to_record(genre: &MalEntity) -> GenreRecord {
    GenreRecord {
        mal_id: genre.mal_id,
        name: genre.name.clone(),
    }
}

/// Distinct genres across a page, in first-seen order
pub fn page_genres(entries: &[AnimeEntry]) -> Vec<GenreRecord> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .flat_map(|entry| entry.genres.iter())
        .filter(|genre| seen.insert(genre.mal_id))
        .map(genre_to_record)
        .collect()
}

pub fn characters_to_records(anime_id: u32, entries: &[CharacterEntry]) -> Vec<CharacterRecord> {
    entries
        .iter()
        .map(|entry| CharacterRecord {
            mal_id: entry.character.mal_id,
            anime_id,
            name: entry.character.name.clone(),
            image_url: entry
                .character
                .images
                .as_ref()
                .and_then(|images| images.jpg.image_url.clone()),
            role: entry.role.clone(),
        })
        .collect()
}

// ========== Storage -> display ==========

/// Display model for a record, with genres joined in the record's order
///
/// Genre ids missing from `genres` are skipped.
pub fn record_to_anime(
    record: AnimeRecord,
    genres: &HashMap<u32, GenreRecord>,
    characters: Vec<CharacterRecord>,
) -> Anime {
    let trailer = record.trailer_youtube_id.map(|youtube_id| Trailer {
        youtube_id,
        url: record.trailer_url.unwrap_or_default(),
        embed_url: record.trailer_embed_url.unwrap_or_default(),
        image_url: record.trailer_image_url,
    });

    Anime {
        mal_id: record.mal_id,
        title: record.title,
        title_english: record.title_english,
        title_japanese: record.title_japanese,
        image_url: record.image_url,
        synopsis: record.synopsis,
        score: record.score,
        episodes: record.episodes,
        status: record.status,
        aired: record.aired,
        genres: record
            .genre_ids
            .iter()
            .filter_map(|id| genres.get(id))
            .map(|genre| Genre {
                mal_id: genre.mal_id,
                name: genre.name.clone(),
            })
            .collect(),
        characters: characters
            .into_iter()
            .map(|character| Character {
                mal_id: character.mal_id,
                name: character.name,
                image_url: character.image_url,
                role: character.role,
            })
            .collect(),
        trailer,
        is_favorite: record.is_favorite,
    }
}

/// Display models for a list of records (no characters)
pub fn records_to_anime(records: Vec<AnimeRecord>, genres: &HashMap<u32, GenreRecord>) -> Vec<Anime> {
    records
        .into_iter()
        .map(|record| record_to_anime(record, genres, Vec::new()))
        .collect()
}

/// Distinct genre ids referenced by `records`
pub fn referenced_genre_ids(records: &[AnimeRecord]) -> Vec<u32> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.genre_ids.iter().copied())
        .filter(|id| seen.insert(*id))
        .collect()
}

pub fn genre_lookup(genres: impl IntoIterator<Item = GenreRecord>) -> HashMap<u32, GenreRecord> {
    genres
        .into_iter()
        .map(|genre| (genre.mal_id, genre))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry() -> AnimeEntry {
        serde_json::from_value(json!({
            "mal_id": 5114,
            "images": { "jpg": { "image_url": "https://cdn.myanimelist.net/images/anime/1208/94745.jpg" } },
            "trailer": {
                "youtube_id": "--IcmZkvL0Q",
                "url": "https://www.youtube.com/watch?v=--IcmZkvL0Q",
                "embed_url": null,
                "images": { "image_url": "https://img.youtube.com/vi/--IcmZkvL0Q/default.jpg" }
            },
            "title": "Fullmetal Alchemist: Brotherhood",
            "title_english": "Fullmetal Alchemist: Brotherhood",
            "title_japanese": "鋼の錬金術師 FULLMETAL ALCHEMIST",
            "episodes": 64,
            "status": "Finished Airing",
            "aired": { "string": "Apr 5, 2009 to Jul 4, 2010" },
            "score": 9.1,
            "synopsis": "After a horrific alchemy experiment goes wrong...",
            "genres": [
                { "mal_id": 1, "type": "anime", "name": "Action" },
                { "mal_id": 2, "type": "anime", "name": "Adventure" }
            ]
        }))
        .expect("valid fixture")
    }

    #[test]
    fn test_entry_to_record() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = entry_to_record(&entry(), now);

        assert_eq!(record.mal_id, 5114);
        assert_eq!(record.genre_ids, vec![1, 2]);
        assert_eq!(record.aired.as_deref(), Some("Apr 5, 2009 to Jul 4, 2010"));
        assert_eq!(record.trailer_youtube_id.as_deref(), Some("--IcmZkvL0Q"));
        assert_eq!(record.trailer_embed_url, None);
        assert!(record.trailer_image_url.is_some());
        assert!(!record.is_favorite);
        assert_eq!(record.last_updated, now);
    }

    #[test]
    fn test_entries_to_records_keep_page_order() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut second = entry();
        second.mal_id = 1;

        let records = entries_to_records(&[entry(), second], now);
        assert_eq!(records[0].last_updated, now);
        assert!(records[1].last_updated < records[0].last_updated);
    }

    #[test]
    fn test_page_genres_deduplicates() {
        let mut second = entry();
        second.mal_id = 1;
        second.genres.truncate(1);

        let genres = page_genres(&[entry(), second]);
        let ids: Vec<u32> = genres.iter().map(|g| g.mal_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_record_to_anime_joins_genres_in_order() {
        let mut record = entry_to_record(&entry(), Utc::now());
        record.genre_ids = vec![2, 99, 1];

        let genres = genre_lookup([
            GenreRecord { mal_id: 1, name: "Action".to_string() },
            GenreRecord { mal_id: 2, name: "Adventure".to_string() },
        ]);
        let anime = record_to_anime(record, &genres, Vec::new());

        let names: Vec<&str> = anime.genres.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Adventure", "Action"]);
    }

    #[test]
    fn test_trailer_requires_youtube_id() {
        let record = entry_to_record(&entry(), Utc::now());
        let anime = record_to_anime(record.clone(), &HashMap::new(), Vec::new());
        let trailer = anime.trailer.expect("trailer");
        assert_eq!(trailer.embed_url, "");
        assert_eq!(trailer.url, "https://www.youtube.com/watch?v=--IcmZkvL0Q");

        let without_id = AnimeRecord {
            trailer_youtube_id: None,
            ..record
        };
        assert!(record_to_anime(without_id, &HashMap::new(), Vec::new())
            .trailer
            .is_none());
    }

    #[test]
    fn test_characters_to_records() -> anyhow::Result<()> {
        let entries: Vec<CharacterEntry> = serde_json::from_value(json!([
            { "character": { "mal_id": 11, "name": "Elric, Edward", "images": { "jpg": { "image_url": "e.jpg" } } }, "role": "Main" },
            { "character": { "mal_id": 12, "name": "Elric, Alphonse" }, "role": "Main" }
        ]))?;

        let records = characters_to_records(5114, &entries);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|c| c.anime_id == 5114));
        assert_eq!(records[0].image_url.as_deref(), Some("e.jpg"));
        assert_eq!(records[1].image_url, None);
        Ok(())
    }

    #[test]
    fn test_referenced_genre_ids() {
        let now = Utc::now();
        let mut other = entry_to_record(&entry(), now);
        other.genre_ids = vec![2, 3];
        let ids = referenced_genre_ids(&[entry_to_record(&entry(), now), other]);
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
