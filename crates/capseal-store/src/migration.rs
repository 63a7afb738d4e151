//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL
//! string that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Capsules table: stores all submitted receipts
        CREATE TABLE capsules (
            capsule_id TEXT PRIMARY KEY,       -- platform-assigned receipt id
            submission_seq INTEGER NOT NULL UNIQUE,  -- store-assigned order
            core_hash TEXT NOT NULL,           -- 64-char hex, chain identity
            submitted_at INTEGER NOT NULL,     -- Unix ms
            capsule_json TEXT NOT NULL         -- full capsule record
        );

        -- Audit ledger: append-only, hash-chained events
        CREATE TABLE audit_events (
            seq INTEGER PRIMARY KEY,           -- strictly increasing, gap-free
            action TEXT NOT NULL,
            actor_hash TEXT NOT NULL,          -- 64-char hex
            context_hash TEXT NOT NULL,        -- 64-char hex
            content_hash TEXT NOT NULL,        -- 64-char hex
            previous_hash TEXT NOT NULL,       -- 64-char hex or 'GENESIS'
            recorded_at INTEGER NOT NULL
        );

        -- Signed checkpoints over the audit ledger
        CREATE TABLE checkpoints (
            counter INTEGER PRIMARY KEY,       -- running checkpoint counter
            checkpoint_id TEXT NOT NULL UNIQUE,
            event_seq INTEGER NOT NULL,
            checkpoint_json TEXT NOT NULL      -- full signed checkpoint
        );

        -- Set-once kill switches per capsule
        CREATE TABLE kill_switches (
            capsule_id TEXT PRIMARY KEY,
            set_at INTEGER NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_capsules_core_hash ON capsules(core_hash);
        CREATE INDEX idx_capsules_submission ON capsules(submission_seq);
        CREATE INDEX idx_checkpoints_event_seq ON checkpoints(event_seq);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        // Verify tables exist
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"capsules".to_string()));
        assert!(tables.contains(&"audit_events".to_string()));
        assert!(tables.contains(&"checkpoints".to_string()));
        assert!(tables.contains(&"kill_switches".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap(); // Should not error
        migrate(&mut conn).unwrap(); // Still should not error

        // Verify version is 1
        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
