//! Offline-first anime catalog.
//!
//! This library serves anime from a local SQLite cache and keeps it fresh
//! from the Jikan API v4 whenever the network is reachable:
//! - `api`: rate-limited Jikan client behind the [`CatalogApi`] trait
//! - `connectivity`: reachability checks
//! - `repository`: live, cache-first reads and favorite management
//! - `mapper`/`domain`: translation into display models

pub mod api;
pub mod connectivity;
pub mod domain;
pub mod mapper;
pub mod repository;

pub use api::{ApiError, CatalogApi, JikanClient, RateLimiter};
pub use connectivity::{Connectivity, ManualConnectivity, TcpProbe};
pub use domain::{Anime, Character, Genre, Trailer};
pub use repository::AnimeRepository;
