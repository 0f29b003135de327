//! Anime Explorer CLI - browse the anime catalog, offline first.

use anime_explorer::connectivity::Connectivity;
use anime_explorer::{Anime, AnimeRepository, JikanClient, ManualConnectivity, TcpProbe};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::{Stream, StreamExt};
use serde::Serialize;
use shared::{CatalogStore, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Never touch the network, serve the local cache only
    #[arg(long)]
    offline: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top-ranked anime
    Top {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Items per page (defaults to `catalog.page_size`)
        #[arg(long)]
        limit: Option<u32>,

        /// Keep printing updates until Ctrl-C
        #[arg(long)]
        follow: bool,
    },

    /// Full detail of one anime, with characters
    Detail {
        id: u32,

        /// Keep printing updates until Ctrl-C
        #[arg(long)]
        follow: bool,
    },

    /// Search by title
    Search {
        query: String,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Toggle the favorite flag of a cached anime
    Favorite { id: u32 },

    /// List favorited anime
    Favorites,

    /// List every cached anime
    Cached,

    /// Remove every non-favorited anime from the cache
    ClearCache,

    /// Show cache statistics
    Stats,

    /// Write the default configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if matches!(args.command, Command::InitConfig) {
        if args.config.exists() {
            bail!("Config file already exists: {}", args.config.display());
        }
        Config::default().save(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let _log_guard = shared::logging::init(shared::LogConfig::from_config(
        &config,
        "anime-explorer",
        args.verbose,
    ))?;

    debug!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize store
    let db_path = config.database_path();
    debug!(db_path = %db_path.display(), "Opening database");
    let store = Arc::new(CatalogStore::open(&db_path).context("Failed to open database")?);

    // Initialize API client and connectivity
    let client = JikanClient::from_config(&config.api).context("Failed to create Jikan client")?;
    let connectivity: Arc<dyn Connectivity> = if args.offline {
        info!("Offline mode, serving cache only");
        Arc::new(ManualConnectivity::new(false))
    } else {
        Arc::new(TcpProbe::from_config(&config.connectivity))
    };

    let repo = AnimeRepository::new(Arc::new(client), store, connectivity)
        .with_search_limit(config.catalog.search_limit);
    let out = Printer { json: args.json };

    match args.command {
        Command::Top {
            page,
            limit,
            follow,
        } => {
            let limit = limit.unwrap_or(config.catalog.page_size);
            if follow {
                follow_stream(repo.top_anime(page, limit), |anime| out.list(anime)).await?;
            } else {
                out.list(&repo.cached_list()?)?;
                if repo.refresh_top_anime(page, limit).await {
                    out.list(&repo.cached_list()?)?;
                }
            }
        }

        Command::Detail { id, follow } => {
            if follow {
                follow_stream(repo.anime_detail(id), |anime| out.detail(anime)).await?;
            } else {
                let cached = repo.cached_detail(id)?;
                if let Some(anime) = &cached {
                    out.detail(anime)?;
                }
                if repo.refresh_anime_detail(id).await {
                    if let Some(anime) = repo.cached_detail(id)? {
                        out.detail(&anime)?;
                    }
                } else if cached.is_none() {
                    bail!("Anime {} is not cached and could not be fetched", id);
                }
            }
        }

        Command::Search { query, page } => {
            let results = first(repo.search_anime(&query, page)).await;
            out.list(&results)?;
        }

        Command::Favorite { id } => match repo.toggle_favorite(id)? {
            Some(true) => println!("Added {} to favorites", id),
            Some(false) => println!("Removed {} from favorites", id),
            None => bail!("Anime {} is not cached", id),
        },

        Command::Favorites => out.list(&first(repo.favorite_anime()).await)?,

        Command::Cached => out.list(&first(repo.cached_anime()).await)?,

        Command::ClearCache => {
            let removed = repo.clear_cache()?;
            println!("Removed {} cached anime (favorites kept)", removed);
        }

        Command::Stats => {
            let stats = repo.stats()?;
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "anime": stats.anime,
                        "favorites": stats.favorites,
                        "genres": stats.genres,
                        "characters": stats.characters,
                    })
                );
            } else {
                println!("=== Cache Statistics ===");
                println!("Anime: {}", stats.anime);
                println!("Favorites: {}", stats.favorites);
                println!("Genres: {}", stats.genres);
                println!("Characters: {}", stats.characters);
            }
        }

        // Written before the configuration is loaded
        Command::InitConfig => {}
    }

    Ok(())
}

/// First emission of a stream, or an empty list if it ends without one
async fn first(stream: impl Stream<Item = Vec<Anime>>) -> Vec<Anime> {
    futures::pin_mut!(stream);
    stream.next().await.unwrap_or_default()
}

/// Print every emission until the stream ends or Ctrl-C
async fn follow_stream<T>(
    stream: impl Stream<Item = T>,
    mut print: impl FnMut(&T) -> Result<()>,
) -> Result<()> {
    futures::pin_mut!(stream);
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(item) => print(&item)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

struct Printer {
    json: bool,
}

impl Printer {
    fn list(&self, anime: &[Anime]) -> Result<()> {
        if self.json {
            return self.json_line(anime);
        }

        if anime.is_empty() {
            println!("No anime found");
        }
        for item in anime {
            println!(
                "{:>6}  {:<7} {}{}",
                item.mal_id,
                item.display_score(),
                item.display_title(),
                if item.is_favorite { "  [favorite]" } else { "" }
            );
        }
        println!();
        Ok(())
    }

    fn detail(&self, anime: &Anime) -> Result<()> {
        if self.json {
            return self.json_line(anime);
        }

        println!("MAL ID: {}", anime.mal_id);
        println!("Title: {}", anime.display_title());
        if let Some(japanese) = &anime.title_japanese {
            println!("Japanese: {}", japanese);
        }
        println!("Score: {}", anime.display_score());
        println!("Episodes: {}", anime.display_episodes());
        if let Some(status) = &anime.status {
            println!("Status: {}", status);
        }
        if let Some(aired) = &anime.aired {
            println!("Aired: {}", aired);
        }
        if !anime.genres.is_empty() {
            let names: Vec<&str> = anime.genres.iter().map(|g| g.name.as_str()).collect();
            println!("Genres: {}", names.join(", "));
        }
        println!("Favorite: {}", if anime.is_favorite { "yes" } else { "no" });
        if let Some(trailer) = &anime.trailer {
            println!("Trailer: {}", trailer.url);
        }
        if let Some(synopsis) = &anime.synopsis {
            println!();
            println!("{}", synopsis);
        }
        if !anime.characters.is_empty() {
            println!();
            println!("Characters:");
            for character in &anime.characters {
                match &character.role {
                    Some(role) => println!("  {} ({})", character.name, role),
                    None => println!("  {}", character.name),
                }
            }
        }
        println!();
        Ok(())
    }

    fn json_line<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }
}
