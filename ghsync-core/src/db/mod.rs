//! Database layer for ghsync
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Upsert-by-id event persistence and bulk enrichment updates

pub mod repo;
pub mod schema;

pub use repo::Database;
