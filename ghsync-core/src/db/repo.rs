//! Database repository layer
//!
//! Provides query and insert operations for the event store and the
//! append-only stats snapshots.

use crate::error::{Error, Result};
use crate::types::{BillingUsage, CommitStat, EventSource, GithubEvent, UserProfileStats};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Event operations
    // ============================================

    /// Insert or update a single event.
    ///
    /// Merge semantics: a re-delivered id within the same partition
    /// overwrites the stored row with the latest-applied content.
    pub fn upsert_event(&self, event: &GithubEvent) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::upsert_event_inner(&conn, event)
    }

    /// Insert or update a whole page of events in one transaction.
    ///
    /// All-or-nothing: if any row fails, the page is rolled back so a
    /// restarted sync re-derives the same cursor state and retries.
    pub fn upsert_events(&self, events: &[GithubEvent]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for event in events {
            Self::upsert_event_inner(&tx, event)?;
        }
        tx.commit()?;
        Ok(events.len())
    }

    fn upsert_event_inner(conn: &Connection, event: &GithubEvent) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO github_events (
                id, source, event_type, actor_id, actor_login, repo_id, repo_name,
                org_id, org_login, payload, public, action, created_at,
                commit_sha, pr_number, node_id, additions, deletions, changed_files
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(id, source) DO UPDATE SET
                event_type = excluded.event_type,
                actor_id = excluded.actor_id,
                actor_login = excluded.actor_login,
                repo_id = excluded.repo_id,
                repo_name = excluded.repo_name,
                org_id = excluded.org_id,
                org_login = excluded.org_login,
                payload = excluded.payload,
                public = excluded.public,
                action = excluded.action,
                created_at = excluded.created_at,
                commit_sha = excluded.commit_sha,
                pr_number = excluded.pr_number,
                node_id = excluded.node_id,
                additions = excluded.additions,
                deletions = excluded.deletions,
                changed_files = excluded.changed_files
            "#,
            params![
                event.id,
                event.source.as_str(),
                event.event_type,
                event.actor_id,
                event.actor_login,
                event.repo_id,
                event.repo_name,
                event.org_id,
                event.org_login,
                event.payload.to_string(),
                event.public,
                event.action,
                event.created_at.to_rfc3339(),
                event.commit_sha,
                event.pr_number,
                event.node_id,
                event.additions,
                event.deletions,
                event.changed_files,
            ],
        )?;
        Ok(())
    }

    /// Get an event by (id, partition)
    pub fn get_event(&self, id: i64, source: EventSource) -> Result<Option<GithubEvent>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM github_events WHERE id = ?1 AND source = ?2",
            params![id, source.as_str()],
            Self::row_to_event,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Count stored events for a partition
    pub fn count_events(&self, source: EventSource) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM github_events WHERE source = ?1",
            [source.as_str()],
            |r| r.get(0),
        )
        .map_err(Error::from)
    }

    /// Oldest stored `created_at` for a partition, if any event exists
    pub fn oldest_created_at(&self, source: EventSource) -> Result<Option<DateTime<Utc>>> {
        self.created_at_extremum(source, "MIN")
    }

    /// Latest stored `created_at` for a partition, if any event exists
    pub fn latest_created_at(&self, source: EventSource) -> Result<Option<DateTime<Utc>>> {
        self.created_at_extremum(source, "MAX")
    }

    fn created_at_extremum(
        &self,
        source: EventSource,
        func: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn.query_row(
            &format!(
                "SELECT {}(created_at) FROM github_events WHERE source = ?1",
                func
            ),
            [source.as_str()],
            |r| r.get(0),
        )?;
        value
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        // A corrupted extremum must not read as "no events"
                        Error::Database(rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        ))
                    })
            })
            .transpose()
    }

    /// Push events from a partition still lacking a `node_id`, capped at
    /// `limit`, oldest first. Ids in `exclude` are skipped so one enrichment
    /// pass never re-selects rows it already attempted.
    pub fn unenriched_push_events(
        &self,
        source: EventSource,
        limit: usize,
        exclude: &[i64],
    ) -> Result<Vec<GithubEvent>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT * FROM github_events
             WHERE source = ? AND event_type = 'PushEvent' AND node_id IS NULL",
        );
        if !exclude.is_empty() {
            let placeholders = vec!["?"; exclude.len()].join(", ");
            sql.push_str(&format!(" AND id NOT IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY created_at ASC LIMIT ?");

        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(exclude.len() + 2);
        values.push(source.as_str().to_string().into());
        for id in exclude {
            values.push((*id).into());
        }
        values.push((limit as i64).into());

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), Self::row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Write resolved commit statistics back onto every push event sharing
    /// the (event_type, commit_sha, repo_id) tuple.
    ///
    /// One transaction per enrichment cycle: a failure leaves no partial
    /// field updates behind. Returns the number of rows updated.
    pub fn apply_commit_stats(&self, stats: &[CommitStat]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut updated = 0;
        for stat in stats {
            updated += tx.execute(
                r#"
                UPDATE github_events
                SET additions = ?1, deletions = ?2, changed_files = ?3, node_id = ?4
                WHERE event_type = 'PushEvent' AND commit_sha = ?5 AND repo_id = ?6
                "#,
                params![
                    stat.additions,
                    stat.deletions,
                    stat.changed_files,
                    stat.node_id,
                    stat.sha,
                    stat.repo_id,
                ],
            )?;
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Cross-reference join: copy the `pr_number` of a closed-and-merged
    /// pull-request event onto every push event sharing its `commit_sha`.
    ///
    /// Set-based, one statement. The join is on commit_sha alone, as given
    /// by the source system; cross-repository SHA collisions are not
    /// guarded against. Returns the number of push events linked.
    pub fn cross_link_pull_requests(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            r#"
            UPDATE github_events AS push
            SET pr_number = (
                SELECT pr.pr_number FROM github_events pr
                WHERE pr.event_type = 'PullRequestEvent'
                  AND pr.action = 'closed'
                  AND pr.commit_sha = push.commit_sha
                  AND pr.pr_number IS NOT NULL
                LIMIT 1
            )
            WHERE push.event_type = 'PushEvent'
              AND push.commit_sha IS NOT NULL
              AND push.pr_number IS NULL
              AND EXISTS (
                  SELECT 1 FROM github_events pr
                  WHERE pr.event_type = 'PullRequestEvent'
                    AND pr.action = 'closed'
                    AND pr.commit_sha = push.commit_sha
                    AND pr.pr_number IS NOT NULL
              )
            "#,
            [],
        )?;
        Ok(updated)
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<GithubEvent> {
        // A row that fails to convert is corruption, not a default: a
        // silently substituted source or timestamp would skew cursor
        // derivation without any visible failure.
        let source_str: String = row.get("source")?;
        let source = EventSource::from_str(&source_str)
            .map_err(|e| Self::conversion_failure(row, "source", e.into()))?;

        let created_at_str: String = row.get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Self::conversion_failure(row, "created_at", Box::new(e)))?;

        let payload_str: Option<String> = row.get("payload")?;

        Ok(GithubEvent {
            id: row.get("id")?,
            source,
            event_type: row.get("event_type")?,
            actor_id: row.get("actor_id")?,
            actor_login: row.get("actor_login")?,
            repo_id: row.get("repo_id")?,
            repo_name: row.get("repo_name")?,
            org_id: row.get("org_id")?,
            org_login: row.get("org_login")?,
            payload: payload_str
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or(serde_json::json!({})),
            public: row.get("public")?,
            action: row.get("action")?,
            created_at,
            commit_sha: row.get("commit_sha")?,
            pr_number: row.get("pr_number")?,
            node_id: row.get("node_id")?,
            additions: row.get("additions")?,
            deletions: row.get("deletions")?,
            changed_files: row.get("changed_files")?,
        })
    }

    fn conversion_failure(
        row: &Row,
        column: &str,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    ) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index(column).unwrap_or(0),
            rusqlite::types::Type::Text,
            source,
        )
    }

    // ============================================
    // Stats snapshot operations (append-only)
    // ============================================

    /// Append a user profile snapshot, stamped at write time
    pub fn insert_user_stats(&self, stats: &UserProfileStats) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO user_stats (user_id, login, company, followers, following,
                                    starred_repos, repos, public_repos, public_gists, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                stats.user_id,
                stats.login,
                stats.company,
                stats.followers,
                stats.following,
                stats.starred_repos,
                stats.repos,
                stats.public_repos,
                stats.public_gists,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Append a billing usage snapshot, stamped at write time
    pub fn insert_billing_usage(&self, usage: &BillingUsage) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO user_dynamic_stats (total_minutes_used, total_paid_minutes_used,
                                            minutes_used_breakdown, recorded_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                usage.total_minutes_used,
                usage.total_paid_minutes_used,
                usage.minutes_used_breakdown.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Count stored user profile snapshots
    pub fn count_user_stats(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM user_stats", [], |r| r.get(0))
            .map_err(Error::from)
    }

    /// Count stored billing snapshots
    pub fn count_billing_usage(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM user_dynamic_stats", [], |r| r.get(0))
            .map_err(Error::from)
    }
}
