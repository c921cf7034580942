//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Canonical event store
    -- ============================================

    -- Ids are assigned by the origin and unique per partition; re-delivery
    -- across pages is expected and resolved by upsert on (id, source).
    CREATE TABLE IF NOT EXISTS github_events (
        id               INTEGER NOT NULL,
        source           TEXT NOT NULL,      -- 'created' | 'received'
        event_type       TEXT NOT NULL,
        actor_id         INTEGER NOT NULL,
        actor_login      TEXT NOT NULL,
        repo_id          INTEGER NOT NULL,
        repo_name        TEXT NOT NULL,
        org_id           INTEGER,
        org_login        TEXT,

        -- Lossless capture
        payload          JSON,
        public           BOOLEAN NOT NULL DEFAULT 0,
        action           TEXT,
        created_at       DATETIME NOT NULL,

        -- Type-specific derived fields (sparse)
        commit_sha       TEXT,
        pr_number        INTEGER,
        node_id          TEXT,
        additions        INTEGER,
        deletions        INTEGER,
        changed_files    INTEGER,

        PRIMARY KEY (id, source)
    );

    -- ============================================
    -- Append-only stats snapshots
    -- ============================================

    CREATE TABLE IF NOT EXISTS user_stats (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id          TEXT NOT NULL,
        login            TEXT NOT NULL,
        company          TEXT,
        followers        INTEGER NOT NULL,
        following        INTEGER NOT NULL,
        starred_repos    INTEGER NOT NULL,
        repos            INTEGER NOT NULL,
        public_repos     INTEGER NOT NULL,
        public_gists     INTEGER NOT NULL,
        recorded_at      DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_dynamic_stats (
        id                      INTEGER PRIMARY KEY AUTOINCREMENT,
        total_minutes_used      INTEGER NOT NULL,
        total_paid_minutes_used INTEGER NOT NULL,
        minutes_used_breakdown  JSON,
        recorded_at             DATETIME NOT NULL
    );

    -- ============================================
    -- Indexes
    -- ============================================

    -- Cursor derivation: min/max created_at per partition
    CREATE INDEX IF NOT EXISTS idx_events_source_created ON github_events(source, created_at);
    -- Enrichment selection and the cross-reference join
    CREATE INDEX IF NOT EXISTS idx_events_type_sha ON github_events(event_type, commit_sha);
    CREATE INDEX IF NOT EXISTS idx_events_unenriched
        ON github_events(source, event_type) WHERE node_id IS NULL;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        // Check version
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = ["github_events", "user_stats", "user_dynamic_stats"];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_event_primary_key_spans_partition() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        // Same id in both partitions must coexist
        conn.execute(
            "INSERT INTO github_events (id, source, event_type, actor_id, actor_login, repo_id, repo_name, created_at)
             VALUES (1, 'created', 'PushEvent', 1, 'a', 1, 'a/b', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO github_events (id, source, event_type, actor_id, actor_login, repo_id, repo_name, created_at)
             VALUES (1, 'received', 'PushEvent', 1, 'a', 1, 'a/b', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM github_events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
