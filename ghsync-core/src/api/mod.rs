//! Remote API collaborators
//!
//! The sync engine talks to two remote collaborators, both modeled as
//! traits so tests can inject fakes:
//!
//! - [`EventFeed`] — the REST-like list-events source, newest-first pages,
//!   empty page signals exhaustion. Implemented by [`GithubClient`].
//! - [`CommitStatsSource`] — the GraphQL-like batch query used by the
//!   enrichment pass. Implemented by [`GraphqlClient`].
//!
//! All remote calls are synchronous and carry a fixed per-request timeout;
//! one request is in flight at a time.

mod graphql;
mod rest;

pub use graphql::GraphqlClient;
pub use rest::GithubClient;

use crate::error::Result;
use crate::types::{CommitStat, EventSource, RawEvent, RepoShaBatch};

/// Paged source of raw activity events, newest-first.
///
/// Returns an empty page both for genuine exhaustion and for server-side
/// failures at or above the 5xx threshold; callers treat either as "stop
/// paging".
pub trait EventFeed {
    fn list_events(&self, source: EventSource, page: u32, per_page: u32) -> Result<Vec<RawEvent>>;
}

/// Batched resolver for commit statistics, one request per enrichment cycle.
///
/// SHAs absent from the result simply failed to resolve (e.g. force-pushed
/// away); that is not an error.
pub trait CommitStatsSource {
    fn commit_stats(&self, batches: &[RepoShaBatch]) -> Result<Vec<CommitStat>>;
}
