//! Event synchronization engine
//!
//! This module orchestrates the fetch/normalize/persist loop per partition
//! and exposes the stats snapshot operations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │  EventFeed   │ ──► │   EventSync   │ ──► │   Database   │
//! │ (REST pages) │     │ (cursor loop) │     │ (upsert page)│
//! └──────────────┘     └───────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌─────────────┐
//!                      │  normalize  │
//!                      └─────────────┘
//! ```
//!
//! ## Cursor logic
//!
//! The feed returns newest-first pages, so page 1 always carries the newest
//! information. Cursor state is never cached: each `sync` invocation derives
//! it from the store's min/max `created_at` for the partition, which makes
//! re-invocation the only retry mechanism needed.
//!
//! - **Bootstrap** (partition empty): walk pages 1, 2, 3, ... until an
//!   empty page; persist everything.
//! - **Incremental**: take the stored latest timestamp as the baseline for
//!   the whole invocation. Persist a page when its newest item is strictly
//!   newer than the baseline; keep paging while a page's oldest item is
//!   still strictly newer than the same baseline.
//!
//! A page persists atomically; one malformed event aborts the whole page
//! rather than leaving a partially normalized batch behind.

mod enrich;

pub use enrich::{CommitEnrichment, EnrichOutcome};

use crate::api::{EventFeed, GithubClient, GraphqlClient};
use crate::db::Database;
use crate::error::Result;
use crate::normalize::normalize;
use crate::types::{EventSource, GithubEvent, RawEvent};

/// Which sync path an invocation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// First-ever sync of the partition; fetched all historical pages
    Bootstrap,
    /// Steady-state catch-up against the stored latest timestamp
    Incremental,
}

/// Result of one sync invocation for one partition.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Which path was taken
    pub mode: SyncMode,
    /// Pages fetched from the feed (including a trailing empty page)
    pub pages_fetched: usize,
    /// Events upserted (counts re-delivered ids too; the merge is idempotent)
    pub events_upserted: usize,
}

/// Drives the cursor tracker + normalizer + persistence loop for one
/// partition at a time.
///
/// Idempotent and safe to re-run: a transport failure aborts the
/// invocation, and the next run re-derives the same cursor state from
/// the store and retries the same work.
pub struct EventSync<'a> {
    db: &'a Database,
    feed: &'a dyn EventFeed,
    page_size: u32,
}

impl<'a> EventSync<'a> {
    pub fn new(db: &'a Database, feed: &'a dyn EventFeed, page_size: u32) -> Self {
        Self {
            db,
            feed,
            page_size,
        }
    }

    /// Run one sync pass over the given partition.
    pub fn sync(&self, source: EventSource) -> Result<SyncOutcome> {
        // Mode selection re-derives cursor state from the store every time
        match self.db.latest_created_at(source)? {
            None => self.bootstrap(source),
            Some(baseline) => self.incremental(source, baseline),
        }
    }

    /// Walk every historical page until the feed is exhausted.
    fn bootstrap(&self, source: EventSource) -> Result<SyncOutcome> {
        tracing::info!(%source, "No stored events for partition, bootstrapping");

        let mut outcome = SyncOutcome {
            mode: SyncMode::Bootstrap,
            pages_fetched: 0,
            events_upserted: 0,
        };

        let mut page = 1;
        loop {
            let raw = self.feed.list_events(source, page, self.page_size)?;
            outcome.pages_fetched += 1;
            if raw.is_empty() {
                break;
            }
            outcome.events_upserted += self.persist_page(&raw, source)?;
            page += 1;
        }

        tracing::info!(
            %source,
            pages = outcome.pages_fetched,
            events = outcome.events_upserted,
            "Bootstrap complete"
        );
        Ok(outcome)
    }

    /// Catch up against the stored latest timestamp.
    ///
    /// The baseline is fixed for the whole invocation: pages persisted
    /// along the way must not move the boundary mid-run, or page 2 would
    /// compare against its own page 1 and stop early.
    fn incremental(
        &self,
        source: EventSource,
        baseline: chrono::DateTime<chrono::Utc>,
    ) -> Result<SyncOutcome> {
        tracing::debug!(%source, %baseline, "Incremental sync");

        let mut outcome = SyncOutcome {
            mode: SyncMode::Incremental,
            pages_fetched: 0,
            events_upserted: 0,
        };

        let mut page = 1;
        loop {
            let raw = self.feed.list_events(source, page, self.page_size)?;
            outcome.pages_fetched += 1;
            if raw.is_empty() {
                break;
            }

            let events = self.normalize_page(&raw, source)?;
            // Newest-first ordering guaranteed by the feed contract
            let newest = events.first().map(|e| e.created_at).unwrap_or(baseline);
            let oldest = events.last().map(|e| e.created_at).unwrap_or(baseline);

            if newest > baseline {
                outcome.events_upserted += self.db.upsert_events(&events)?;
            }

            if oldest > baseline {
                // The whole page was new; there may be more beyond it
                page += 1;
            } else {
                tracing::debug!(%source, page, "Incremental boundary reached");
                break;
            }
        }

        Ok(outcome)
    }

    /// Normalize and persist one page atomically.
    fn persist_page(&self, raw: &[RawEvent], source: EventSource) -> Result<usize> {
        let events = self.normalize_page(raw, source)?;
        self.db.upsert_events(&events)
    }

    /// Normalize a whole page; one malformed event fails the batch.
    fn normalize_page(&self, raw: &[RawEvent], source: EventSource) -> Result<Vec<GithubEvent>> {
        raw.iter().map(|r| normalize(r, source)).collect()
    }
}

/// Snapshot the authenticated user's profile counters into `user_stats`.
pub fn sync_user_stats(db: &Database, api: &GraphqlClient) -> Result<()> {
    let stats = api.viewer_stats()?;
    db.insert_user_stats(&stats)?;
    tracing::info!(login = %stats.login, "Recorded user stats snapshot");
    Ok(())
}

/// Snapshot the account's Actions billing usage into `user_dynamic_stats`.
pub fn sync_billing_stats(db: &Database, api: &GithubClient) -> Result<()> {
    let usage = api.billing_usage()?;
    db.insert_billing_usage(&usage)?;
    tracing::info!(
        total_minutes = usage.total_minutes_used,
        "Recorded billing stats snapshot"
    );
    Ok(())
}
