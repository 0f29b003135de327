//! Shared library for the anime-explorer workspace.
//!
//! This crate provides the local side of the offline-first catalog:
//! - Configuration management
//! - Logging infrastructure
//! - SQLite database and schema
//! - Storage records for anime, genres and characters
//! - The catalog store with change notifications for live queries

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;
pub use store::{CatalogStore, StoreChange, StoreStats, Table};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
