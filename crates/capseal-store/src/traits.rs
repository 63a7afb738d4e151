//! Store trait: the abstract interface for capseal persistence.
//!
//! This trait allows the verification core to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use capseal_core::Capsule;
use capseal_ledger::{AuditEvent, Checkpoint};

use crate::error::Result;

/// A stored capsule plus submission bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleRecord {
    /// Store-assigned, strictly increasing submission order. Gives chain
    /// lookups a stable iteration order.
    pub submission_seq: u64,
    /// The capsule as submitted, immutable.
    pub capsule: Capsule,
    /// Cached core hash (hex) computed at submission time.
    pub core_hash: String,
    /// When the capsule was accepted (Unix milliseconds).
    pub submitted_at: i64,
}

/// Result of inserting a capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Capsule was inserted successfully.
    Inserted(CapsuleRecord),
    /// The identical capsule already exists (idempotent - not an error).
    AlreadyExists,
    /// A different capsule already claims this capsule id.
    Conflict {
        /// Core hash of the existing capsule.
        existing_core_hash: String,
    },
}

/// The Store trait: async interface for capseal persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Idempotent capsule inserts**: re-submitting the same capsule
///   returns `AlreadyExists`; a different capsule under an existing id is
///   a `Conflict`.
/// - **Audit appends are guarded**: appending an event at an occupied
///   sequence number fails, so two racing writers can never both attach a
///   successor to the same head.
/// - **Failure propagation**: persistence faults surface as errors; they
///   are never swallowed, because a silently dropped audit write would
///   corrupt the tamper-evidence guarantee.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────
    // Capsule Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a submitted capsule.
    async fn insert_capsule(
        &self,
        capsule: &Capsule,
        core_hash: &str,
        submitted_at: i64,
    ) -> Result<InsertOutcome>;

    /// Get a capsule record by its platform-assigned id.
    async fn get_capsule(&self, capsule_id: &str) -> Result<Option<CapsuleRecord>>;

    /// List all capsule records in submission order.
    async fn list_capsules(&self) -> Result<Vec<CapsuleRecord>>;

    /// Number of stored capsules.
    async fn capsule_count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────
    // Audit Ledger Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Durably append an audit event. Fails if the sequence number is
    /// already occupied.
    async fn append_audit_event(&self, event: &AuditEvent) -> Result<()>;

    /// The current head of the ledger.
    async fn latest_audit_event(&self) -> Result<Option<AuditEvent>>;

    /// Get one event by sequence number.
    async fn get_audit_event(&self, seq: u64) -> Result<Option<AuditEvent>>;

    /// Get events with `from <= seq <= to`, ordered by seq.
    async fn get_audit_events(&self, from: u64, to: u64) -> Result<Vec<AuditEvent>>;

    /// Total number of events in the ledger.
    async fn audit_event_count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────
    // Checkpoint Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Durably store a checkpoint.
    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// The most recent checkpoint by counter.
    async fn latest_checkpoint(&self) -> Result<Option<Checkpoint>>;

    /// All checkpoints in ascending counter order.
    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>>;

    // ─────────────────────────────────────────────────────────────────────
    // Kill Switch Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Set the kill switch for a capsule. Set-once: repeated calls are
    /// idempotent and the flag can never be cleared.
    async fn set_kill_switch(&self, capsule_id: &str, at: i64) -> Result<()>;

    /// Whether the kill switch is set for a capsule.
    async fn kill_switch_set(&self, capsule_id: &str) -> Result<bool>;
}
