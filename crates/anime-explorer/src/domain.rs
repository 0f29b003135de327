//! Display models handed to callers.

use serde::{Deserialize, Serialize};

/// Anime with joined genres and characters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anime {
    pub mal_id: u32,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    pub image_url: String,
    pub synopsis: Option<String>,
    pub score: Option<f64>,
    pub episodes: Option<u32>,
    pub status: Option<String>,
    pub aired: Option<String>,
    pub genres: Vec<Genre>,
    pub characters: Vec<Character>,
    pub trailer: Option<Trailer>,
    pub is_favorite: bool,
}

impl Anime {
    /// English title when known, otherwise the default title
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title)
    }

    pub fn display_score(&self) -> String {
        match self.score {
            Some(score) => format!("★ {:.1}", score),
            None => "N/A".to_string(),
        }
    }

    pub fn display_episodes(&self) -> String {
        match self.episodes {
            Some(episodes) => format!("{} episodes", episodes),
            None => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub mal_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub mal_id: u32,
    pub name: String,
    pub image_url: Option<String>,
    pub role: Option<String>,
}

/// YouTube trailer; only present when the video id is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trailer {
    pub youtube_id: String,
    pub url: String,
    pub embed_url: String,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anime() -> Anime {
        Anime {
            mal_id: 1,
            title: "Shingeki no Kyojin".to_string(),
            title_english: Some("Attack on Titan".to_string()),
            title_japanese: None,
            image_url: String::new(),
            synopsis: None,
            score: Some(8.54),
            episodes: Some(25),
            status: None,
            aired: None,
            genres: Vec::new(),
            characters: Vec::new(),
            trailer: None,
            is_favorite: false,
        }
    }

    #[test]
    fn test_display_helpers() {
        let anime = anime();
        assert_eq!(anime.display_title(), "Attack on Titan");
        assert_eq!(anime.display_score(), "★ 8.5");
        assert_eq!(anime.display_episodes(), "25 episodes");
    }

    #[test]
    fn test_display_fallbacks() {
        let anime = Anime {
            title_english: None,
            score: None,
            episodes: None,
            ..anime()
        };
        assert_eq!(anime.display_title(), "Shingeki no Kyojin");
        assert_eq!(anime.display_score(), "N/A");
        assert_eq!(anime.display_episodes(), "Unknown");
    }
}
