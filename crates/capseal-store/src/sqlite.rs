//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for capseal. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use capseal_core::Capsule;
use capseal_ledger::{AuditAction, AuditEvent, Checkpoint};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CapsuleRecord, InsertOutcome, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation against the connection off the runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Runtime(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Runtime(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Convert a capsules row into a record.
fn read_capsule(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u64, String, i64, String)> {
    Ok((
        row.get("submission_seq")?,
        row.get("core_hash")?,
        row.get("submitted_at")?,
        row.get("capsule_json")?,
    ))
}

fn into_capsule_record(
    (submission_seq, core_hash, submitted_at, json): (u64, String, i64, String),
) -> Result<CapsuleRecord> {
    let capsule: Capsule = serde_json::from_str(&json)?;
    Ok(CapsuleRecord {
        submission_seq,
        capsule,
        core_hash,
        submitted_at,
    })
}

/// Convert an audit_events row into an event.
fn read_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let action_tag: String = row.get("action")?;
    let action = AuditAction::from_str_tag(&action_tag).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(1, "action".into(), rusqlite::types::Type::Text)
    })?;

    Ok(AuditEvent {
        seq: row.get("seq")?,
        action,
        actor_hash: row.get("actor_hash")?,
        context_hash: row.get("context_hash")?,
        content_hash: row.get("content_hash")?,
        previous_hash: row.get("previous_hash")?,
        recorded_at: row.get("recorded_at")?,
    })
}

/// Convert a checkpoints row into a checkpoint.
fn read_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<String> {
    row.get("checkpoint_json")
}

fn into_checkpoint(json: String) -> Result<Checkpoint> {
    Ok(serde_json::from_str(&json)?)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_capsule(
        &self,
        capsule: &Capsule,
        core_hash: &str,
        submitted_at: i64,
    ) -> Result<InsertOutcome> {
        let capsule = capsule.clone();
        let core_hash = core_hash.to_string();

        self.with_conn(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT core_hash FROM capsules WHERE capsule_id = ?1",
                    params![capsule.capsule_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_core_hash) = existing {
                if existing_core_hash == core_hash {
                    return Ok(InsertOutcome::AlreadyExists);
                }
                return Ok(InsertOutcome::Conflict { existing_core_hash });
            }

            let submission_seq: u64 = conn.query_row(
                "SELECT COALESCE(MAX(submission_seq), 0) + 1 FROM capsules",
                [],
                |row| row.get(0),
            )?;

            let json = serde_json::to_string(&capsule)?;
            conn.execute(
                "INSERT INTO capsules (
                    capsule_id, submission_seq, core_hash, submitted_at, capsule_json
                ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    capsule.capsule_id,
                    submission_seq,
                    core_hash,
                    submitted_at,
                    json,
                ],
            )?;

            Ok(InsertOutcome::Inserted(CapsuleRecord {
                submission_seq,
                capsule,
                core_hash,
                submitted_at,
            }))
        })
        .await
    }

    async fn get_capsule(&self, capsule_id: &str) -> Result<Option<CapsuleRecord>> {
        let capsule_id = capsule_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT submission_seq, core_hash, submitted_at, capsule_json
                     FROM capsules WHERE capsule_id = ?1",
                    params![capsule_id],
                    read_capsule,
                )
                .optional()?;

            row.map(into_capsule_record).transpose()
        })
        .await
    }

    async fn list_capsules(&self) -> Result<Vec<CapsuleRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT submission_seq, core_hash, submitted_at, capsule_json
                 FROM capsules ORDER BY submission_seq ASC",
            )?;
            let rows = stmt.query_map([], read_capsule)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(into_capsule_record(row?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn capsule_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM capsules", [], |row| row.get(0))?)
        })
        .await
    }

    async fn append_audit_event(&self, event: &AuditEvent) -> Result<()> {
        let event = event.clone();
        self.with_conn(move |conn| {
            let occupied: Option<u64> = conn
                .query_row(
                    "SELECT seq FROM audit_events WHERE seq = ?1",
                    params![event.seq],
                    |row| row.get(0),
                )
                .optional()?;
            if occupied.is_some() {
                return Err(StoreError::HeadConflict { seq: event.seq });
            }

            conn.execute(
                "INSERT INTO audit_events (
                    seq, action, actor_hash, context_hash, content_hash,
                    previous_hash, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.seq,
                    event.action.as_str(),
                    event.actor_hash,
                    event.context_hash,
                    event.content_hash,
                    event.previous_hash,
                    event.recorded_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_audit_event(&self) -> Result<Option<AuditEvent>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT seq, action, actor_hash, context_hash, content_hash,
                            previous_hash, recorded_at
                     FROM audit_events ORDER BY seq DESC LIMIT 1",
                    [],
                    read_event,
                )
                .optional()?)
        })
        .await
    }

    async fn get_audit_event(&self, seq: u64) -> Result<Option<AuditEvent>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT seq, action, actor_hash, context_hash, content_hash,
                            previous_hash, recorded_at
                     FROM audit_events WHERE seq = ?1",
                    params![seq],
                    read_event,
                )
                .optional()?)
        })
        .await
    }

    async fn get_audit_events(&self, from: u64, to: u64) -> Result<Vec<AuditEvent>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, action, actor_hash, context_hash, content_hash,
                        previous_hash, recorded_at
                 FROM audit_events WHERE seq >= ?1 AND seq <= ?2 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![from, to], read_event)?;

            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
    }

    async fn audit_event_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?)
        })
        .await
    }

    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let checkpoint = checkpoint.clone();
        self.with_conn(move |conn| {
            let occupied: Option<u64> = conn
                .query_row(
                    "SELECT counter FROM checkpoints WHERE counter = ?1",
                    params![checkpoint.counter],
                    |row| row.get(0),
                )
                .optional()?;
            if occupied.is_some() {
                return Err(StoreError::CheckpointConflict {
                    counter: checkpoint.counter,
                });
            }

            let json = serde_json::to_string(&checkpoint)?;
            conn.execute(
                "INSERT INTO checkpoints (counter, checkpoint_id, event_seq, checkpoint_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    checkpoint.counter,
                    checkpoint.checkpoint_id,
                    checkpoint.event_seq,
                    json,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
        self.with_conn(|conn| {
            let json = conn
                .query_row(
                    "SELECT checkpoint_json FROM checkpoints ORDER BY counter DESC LIMIT 1",
                    [],
                    read_checkpoint,
                )
                .optional()?;
            json.map(into_checkpoint).transpose()
        })
        .await
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT checkpoint_json FROM checkpoints ORDER BY counter ASC",
            )?;
            let rows = stmt.query_map([], read_checkpoint)?;

            let mut checkpoints = Vec::new();
            for row in rows {
                checkpoints.push(into_checkpoint(row?)?);
            }
            Ok(checkpoints)
        })
        .await
    }

    async fn set_kill_switch(&self, capsule_id: &str, at: i64) -> Result<()> {
        let capsule_id = capsule_id.to_string();
        self.with_conn(move |conn| {
            // Set-once: the first timestamp wins, later calls are no-ops.
            conn.execute(
                "INSERT OR IGNORE INTO kill_switches (capsule_id, set_at) VALUES (?1, ?2)",
                params![capsule_id, at],
            )?;
            Ok(())
        })
        .await
    }

    async fn kill_switch_set(&self, capsule_id: &str) -> Result<bool> {
        let capsule_id = capsule_id.to_string();
        self.with_conn(move |conn| {
            let row: Option<i64> = conn
                .query_row(
                    "SELECT set_at FROM kill_switches WHERE capsule_id = ?1",
                    params![capsule_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row.is_some())
        })
        .await
    }
}
