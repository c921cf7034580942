//! Commit enrichment pass
//!
//! The list-events feed omits per-commit statistics, so push events land
//! with only a head SHA. This pass backfills additions/deletions/changed
//! files and the commit node id in batched cycles, then cross-references
//! closed pull requests onto pushes that share a merge commit SHA.
//!
//! Only the created partition is enriched; received events are kept as
//! delivered.

use std::collections::BTreeMap;

use crate::api::CommitStatsSource;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{EventSource, GithubEvent, RepoShaBatch};

/// Counters for one enrichment invocation.
#[derive(Debug, Default)]
pub struct EnrichOutcome {
    /// Batched query cycles executed
    pub cycles: usize,
    /// Push events selected across all cycles
    pub events_selected: usize,
    /// Rows that received commit statistics
    pub events_updated: usize,
    /// Commits the remote source could not resolve
    pub commits_unresolved: usize,
    /// Push rows that gained a `pr_number` via the cross-reference step
    pub pull_requests_linked: usize,
}

/// Backfills commit statistics onto stored push events.
///
/// Each cycle selects up to `batch_size` unenriched pushes, resolves their
/// SHAs with a single batched query, and bulk-applies the results. Commits
/// the remote cannot resolve stay unenriched; they are skipped for the
/// rest of this pass but become eligible again on the next run.
pub struct CommitEnrichment<'a> {
    db: &'a Database,
    stats: &'a dyn CommitStatsSource,
    batch_size: usize,
}

impl<'a> CommitEnrichment<'a> {
    pub fn new(db: &'a Database, stats: &'a dyn CommitStatsSource, batch_size: usize) -> Self {
        Self {
            db,
            stats,
            batch_size,
        }
    }

    /// Run cycles until no unattempted candidates remain, then link
    /// closed pull requests onto enriched pushes.
    pub fn run(&self) -> Result<EnrichOutcome> {
        let mut outcome = EnrichOutcome::default();
        // Ids already tried this pass; without this, an unresolvable
        // commit would be re-selected forever.
        let mut attempted: Vec<i64> = Vec::new();

        loop {
            let batch =
                self.db
                    .unenriched_push_events(EventSource::Created, self.batch_size, &attempted)?;
            if batch.is_empty() {
                break;
            }

            outcome.cycles += 1;
            outcome.events_selected += batch.len();
            attempted.extend(batch.iter().map(|e| e.id));

            let groups = group_by_repo(&batch)?;
            let requested: usize = groups.iter().map(|g| g.shas.len()).sum();
            let resolved = self.stats.commit_stats(&groups)?;
            outcome.commits_unresolved += requested - resolved.len();

            let updated = self.db.apply_commit_stats(&resolved)?;
            outcome.events_updated += updated;

            tracing::debug!(
                selected = batch.len(),
                resolved = resolved.len(),
                updated,
                "Enrichment cycle complete"
            );
        }

        outcome.pull_requests_linked = self.db.cross_link_pull_requests()?;

        tracing::info!(
            cycles = outcome.cycles,
            updated = outcome.events_updated,
            unresolved = outcome.commits_unresolved,
            linked = outcome.pull_requests_linked,
            "Enrichment pass complete"
        );
        Ok(outcome)
    }
}

/// Group a batch of push events into per-repository SHA lists.
///
/// The stored full name must split into exactly `owner/name`; anything
/// else fails the pass with `MalformedRepoName`.
fn group_by_repo(events: &[GithubEvent]) -> Result<Vec<RepoShaBatch>> {
    // BTreeMap keeps group order deterministic for the query builder
    let mut groups: BTreeMap<i64, RepoShaBatch> = BTreeMap::new();

    for event in events {
        let sha = match &event.commit_sha {
            Some(sha) => sha,
            None => continue,
        };
        let (owner, name) = split_full_name(&event.repo_name)?;
        let group = groups.entry(event.repo_id).or_insert_with(|| RepoShaBatch {
            repo_id: event.repo_id,
            owner: owner.to_string(),
            name: name.to_string(),
            shas: Vec::new(),
        });
        if !group.shas.contains(sha) {
            group.shas.push(sha.clone());
        }
    }

    Ok(groups.into_values().collect())
}

fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    match full_name.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
        _ => Err(Error::MalformedRepoName(full_name.to_string())),
    }
}
