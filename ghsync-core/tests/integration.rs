//! Integration tests for the ghsync sync and enrichment pipeline
//!
//! These tests drive the full fetch -> normalize -> persist -> enrich flow
//! against an on-disk SQLite database, with fake remote collaborators in
//! place of the GitHub clients.

use ghsync_core::api::{CommitStatsSource, EventFeed};
use ghsync_core::db::Database;
use ghsync_core::types::{CommitStat, EventSource, RawEvent, RepoShaBatch};
use ghsync_core::{CommitEnrichment, EventSync, Result, SyncMode};
use serde_json::json;
use std::collections::HashMap;
use tempfile::TempDir;

/// Feed fake serving fixed newest-first pages per partition
struct FakeFeed {
    pages: HashMap<EventSource, Vec<Vec<RawEvent>>>,
}

impl FakeFeed {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    fn with_pages(mut self, source: EventSource, pages: Vec<Vec<RawEvent>>) -> Self {
        self.pages.insert(source, pages);
        self
    }
}

impl EventFeed for FakeFeed {
    fn list_events(&self, source: EventSource, page: u32, _per_page: u32) -> Result<Vec<RawEvent>> {
        Ok(self
            .pages
            .get(&source)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }
}

/// Stats fake resolving a fixed set of commits
struct FakeStats {
    known: Vec<CommitStat>,
}

impl CommitStatsSource for FakeStats {
    fn commit_stats(&self, batches: &[RepoShaBatch]) -> Result<Vec<CommitStat>> {
        Ok(self
            .known
            .iter()
            .filter(|s| {
                batches
                    .iter()
                    .any(|b| b.repo_id == s.repo_id && b.shas.contains(&s.sha))
            })
            .cloned()
            .collect())
    }
}

fn raw_push(id: u64, sha: &str, ts: &str) -> RawEvent {
    serde_json::from_value(json!({
        "id": id.to_string(),
        "type": "PushEvent",
        "actor": { "id": 1, "login": "octocat" },
        "repo": { "id": 100, "name": "octocat/hello-world" },
        "payload": { "head": sha },
        "public": true,
        "created_at": ts
    }))
    .unwrap()
}

fn raw_closed_pr(id: u64, number: i64, merge_sha: &str, ts: &str) -> RawEvent {
    serde_json::from_value(json!({
        "id": id.to_string(),
        "type": "PullRequestEvent",
        "actor": { "id": 1, "login": "octocat" },
        "repo": { "id": 100, "name": "octocat/hello-world" },
        "payload": {
            "action": "closed",
            "number": number,
            "pull_request": {
                "node_id": format!("PR_{}", number),
                "merge_commit_sha": merge_sha,
                "additions": 20,
                "deletions": 5,
                "changed_files": 3
            }
        },
        "public": true,
        "created_at": ts
    }))
    .unwrap()
}

fn open_db(dir: &TempDir) -> Database {
    let db = Database::open(&dir.path().join("test.db")).expect("database should open");
    db.migrate().expect("migrations should run");
    db
}

// ============================================
// Full Pipeline Tests
// ============================================

#[test]
fn test_full_sync_and_enrich_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir);

    // Bootstrap: two pages of history for the created partition
    let feed = FakeFeed::new().with_pages(
        EventSource::Created,
        vec![
            vec![
                raw_closed_pr(4, 42, "sha3", "2024-03-04T00:00:00Z"),
                raw_push(3, "sha3", "2024-03-03T00:00:00Z"),
            ],
            vec![
                raw_push(2, "sha2", "2024-03-02T00:00:00Z"),
                raw_push(1, "sha1", "2024-03-01T00:00:00Z"),
            ],
        ],
    );

    let sync = EventSync::new(&db, &feed, 100);
    let outcome = sync.sync(EventSource::Created).expect("sync should succeed");
    assert_eq!(outcome.mode, SyncMode::Bootstrap);
    assert_eq!(outcome.events_upserted, 4);
    assert_eq!(db.count_events(EventSource::Created).unwrap(), 4);

    // Enrich: sha1 and sha3 resolve, sha2 was force-pushed away
    let stats = FakeStats {
        known: vec![
            CommitStat {
                repo_id: 100,
                sha: "sha1".to_string(),
                additions: 10,
                deletions: 2,
                changed_files: 1,
                node_id: "C_sha1".to_string(),
            },
            CommitStat {
                repo_id: 100,
                sha: "sha3".to_string(),
                additions: 20,
                deletions: 5,
                changed_files: 3,
                node_id: "C_sha3".to_string(),
            },
        ],
    };
    let outcome = CommitEnrichment::new(&db, &stats, 50)
        .run()
        .expect("enrichment should succeed");

    assert_eq!(outcome.events_selected, 3);
    assert_eq!(outcome.events_updated, 2);
    assert_eq!(outcome.commits_unresolved, 1);

    // Enriched push carries the commit stats
    let push = db.get_event(3, EventSource::Created).unwrap().unwrap();
    assert_eq!(push.node_id.as_deref(), Some("C_sha3"));
    assert_eq!(push.additions, Some(20));
    assert_eq!(push.deletions, Some(5));
    assert_eq!(push.changed_files, Some(3));

    // The push sharing the closed PR's merge commit got cross-linked
    assert_eq!(outcome.pull_requests_linked, 1);
    assert_eq!(push.pr_number, Some(42));

    // The unresolvable push stayed bare and eligible
    let bare = db.get_event(2, EventSource::Created).unwrap().unwrap();
    assert!(bare.node_id.is_none());
    assert!(bare.additions.is_none());
}

#[test]
fn test_incremental_follows_bootstrap() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir);

    let feed = FakeFeed::new().with_pages(
        EventSource::Created,
        vec![vec![raw_push(1, "sha1", "2024-03-01T00:00:00Z")]],
    );
    let outcome = EventSync::new(&db, &feed, 100)
        .sync(EventSource::Created)
        .unwrap();
    assert_eq!(outcome.mode, SyncMode::Bootstrap);

    // Next run sees one new event above the stored boundary plus overlap
    let feed = FakeFeed::new().with_pages(
        EventSource::Created,
        vec![vec![
            raw_push(2, "sha2", "2024-03-02T00:00:00Z"),
            raw_push(1, "sha1", "2024-03-01T00:00:00Z"),
        ]],
    );
    let outcome = EventSync::new(&db, &feed, 100)
        .sync(EventSource::Created)
        .unwrap();

    assert_eq!(outcome.mode, SyncMode::Incremental);
    assert_eq!(db.count_events(EventSource::Created).unwrap(), 2);

    // Re-running against the same feed changes nothing
    let outcome = EventSync::new(&db, &feed, 100)
        .sync(EventSource::Created)
        .unwrap();
    assert_eq!(outcome.events_upserted, 0);
    assert_eq!(db.count_events(EventSource::Created).unwrap(), 2);
}

// ============================================
// Partition Isolation Tests
// ============================================

#[test]
fn test_partitions_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir);

    // Same event id delivered on both feeds; the rows coexist
    let feed = FakeFeed::new()
        .with_pages(
            EventSource::Created,
            vec![vec![raw_push(1, "sha1", "2024-03-05T00:00:00Z")]],
        )
        .with_pages(
            EventSource::Received,
            vec![vec![raw_push(1, "sha1", "2024-03-01T00:00:00Z")]],
        );

    let sync = EventSync::new(&db, &feed, 100);
    sync.sync(EventSource::Created).unwrap();
    sync.sync(EventSource::Received).unwrap();

    assert_eq!(db.count_events(EventSource::Created).unwrap(), 1);
    assert_eq!(db.count_events(EventSource::Received).unwrap(), 1);

    // Cursor boundaries never cross partitions
    assert_eq!(
        db.latest_created_at(EventSource::Created)
            .unwrap()
            .unwrap()
            .to_rfc3339(),
        "2024-03-05T00:00:00+00:00"
    );
    assert_eq!(
        db.latest_created_at(EventSource::Received)
            .unwrap()
            .unwrap()
            .to_rfc3339(),
        "2024-03-01T00:00:00+00:00"
    );
}

#[test]
fn test_received_partition_is_not_enriched() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir);

    let feed = FakeFeed::new().with_pages(
        EventSource::Received,
        vec![vec![raw_push(1, "sha1", "2024-03-01T00:00:00Z")]],
    );
    EventSync::new(&db, &feed, 100)
        .sync(EventSource::Received)
        .unwrap();

    let stats = FakeStats {
        known: vec![CommitStat {
            repo_id: 100,
            sha: "sha1".to_string(),
            additions: 10,
            deletions: 2,
            changed_files: 1,
            node_id: "C_sha1".to_string(),
        }],
    };
    let outcome = CommitEnrichment::new(&db, &stats, 50).run().unwrap();

    assert_eq!(outcome.events_selected, 0);
    let event = db.get_event(1, EventSource::Received).unwrap().unwrap();
    assert!(event.node_id.is_none());
}

// ============================================
// Normalization Through The Pipeline
// ============================================

#[test]
fn test_pull_request_fields_survive_storage() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir);

    let feed = FakeFeed::new().with_pages(
        EventSource::Created,
        vec![vec![raw_closed_pr(7, 99, "deadbeef", "2024-03-01T00:00:00Z")]],
    );
    EventSync::new(&db, &feed, 100)
        .sync(EventSource::Created)
        .unwrap();

    let event = db.get_event(7, EventSource::Created).unwrap().unwrap();
    assert_eq!(event.event_type, "PullRequestEvent");
    assert_eq!(event.action.as_deref(), Some("closed"));
    assert_eq!(event.pr_number, Some(99));
    assert_eq!(event.node_id.as_deref(), Some("PR_99"));
    assert_eq!(event.commit_sha.as_deref(), Some("deadbeef"));
    assert_eq!(event.additions, Some(20));

    // The raw payload round-trips verbatim
    assert_eq!(
        event.payload["pull_request"]["merge_commit_sha"],
        json!("deadbeef")
    );
}

#[test]
fn test_unknown_event_type_is_stored_without_derived_fields() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir);

    let raw: RawEvent = serde_json::from_value(json!({
        "id": "11",
        "type": "WatchEvent",
        "actor": { "id": 1, "login": "octocat" },
        "repo": { "id": 100, "name": "octocat/hello-world" },
        "payload": { "action": "started" },
        "public": true,
        "created_at": "2024-03-01T00:00:00Z"
    }))
    .unwrap();

    let feed = FakeFeed::new().with_pages(EventSource::Created, vec![vec![raw]]);
    EventSync::new(&db, &feed, 100)
        .sync(EventSource::Created)
        .unwrap();

    let event = db.get_event(11, EventSource::Created).unwrap().unwrap();
    assert_eq!(event.event_type, "WatchEvent");
    assert_eq!(event.action.as_deref(), Some("started"));
    assert!(event.commit_sha.is_none());
    assert!(event.pr_number.is_none());
    assert!(event.node_id.is_none());
}
