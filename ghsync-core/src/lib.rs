//! # ghsync-core
//!
//! Core library for ghsync - an incremental GitHub activity archiver.
//!
//! This library provides:
//! - Domain types for raw and normalized activity events
//! - Database storage layer with SQLite
//! - REST/GraphQL API clients
//! - The sync engine and commit enrichment pass
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Events flow through three stages:
//! - **Fetch:** Paged, newest-first activity feeds (created / received)
//! - **Normalize:** Per-type extraction into one canonical event record,
//!   raw payload preserved verbatim
//! - **Enrich:** Batched backfill of commit statistics and pull request
//!   cross-references
//!
//! ## Example
//!
//! ```rust,no_run
//! use ghsync_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use sync::{CommitEnrichment, EnrichOutcome, EventSync, SyncMode, SyncOutcome};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod sync;
pub mod types;
