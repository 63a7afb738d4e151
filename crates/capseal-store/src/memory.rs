//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use capseal_core::Capsule;
use capseal_ledger::{AuditEvent, Checkpoint};

use crate::error::{Result, StoreError};
use crate::traits::{CapsuleRecord, InsertOutcome, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Capsule records indexed by capsule id.
    capsules: HashMap<String, CapsuleRecord>,

    /// Submission order: submission_seq -> capsule_id.
    submissions: BTreeMap<u64, String>,

    /// Audit events by sequence number.
    audit_events: BTreeMap<u64, AuditEvent>,

    /// Checkpoints by counter.
    checkpoints: BTreeMap<u64, Checkpoint>,

    /// Capsules with the kill switch set.
    kill_switches: HashSet<String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                capsules: HashMap::new(),
                submissions: BTreeMap::new(),
                audit_events: BTreeMap::new(),
                checkpoints: BTreeMap::new(),
                kill_switches: HashSet::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_capsule(
        &self,
        capsule: &Capsule,
        core_hash: &str,
        submitted_at: i64,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().unwrap();

        if let Some(existing) = inner.capsules.get(&capsule.capsule_id) {
            if existing.core_hash == core_hash {
                return Ok(InsertOutcome::AlreadyExists);
            }
            return Ok(InsertOutcome::Conflict {
                existing_core_hash: existing.core_hash.clone(),
            });
        }

        let submission_seq = inner
            .submissions
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            + 1;

        let record = CapsuleRecord {
            submission_seq,
            capsule: capsule.clone(),
            core_hash: core_hash.to_string(),
            submitted_at,
        };

        inner
            .submissions
            .insert(submission_seq, capsule.capsule_id.clone());
        inner
            .capsules
            .insert(capsule.capsule_id.clone(), record.clone());

        Ok(InsertOutcome::Inserted(record))
    }

    async fn get_capsule(&self, capsule_id: &str) -> Result<Option<CapsuleRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.capsules.get(capsule_id).cloned())
    }

    async fn list_capsules(&self) -> Result<Vec<CapsuleRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .submissions
            .values()
            .filter_map(|id| inner.capsules.get(id).cloned())
            .collect())
    }

    async fn capsule_count(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner.capsules.len() as u64)
    }

    async fn append_audit_event(&self, event: &AuditEvent) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.audit_events.contains_key(&event.seq) {
            return Err(StoreError::HeadConflict { seq: event.seq });
        }
        inner.audit_events.insert(event.seq, event.clone());
        Ok(())
    }

    async fn latest_audit_event(&self) -> Result<Option<AuditEvent>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.audit_events.values().next_back().cloned())
    }

    async fn get_audit_event(&self, seq: u64) -> Result<Option<AuditEvent>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.audit_events.get(&seq).cloned())
    }

    async fn get_audit_events(&self, from: u64, to: u64) -> Result<Vec<AuditEvent>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .audit_events
            .range(from..=to)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn audit_event_count(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner.audit_events.len() as u64)
    }

    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.checkpoints.contains_key(&checkpoint.counter) {
            return Err(StoreError::CheckpointConflict {
                counter: checkpoint.counter,
            });
        }
        inner
            .checkpoints
            .insert(checkpoint.counter, checkpoint.clone());
        Ok(())
    }

    async fn latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.checkpoints.values().next_back().cloned())
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.checkpoints.values().cloned().collect())
    }

    async fn set_kill_switch(&self, capsule_id: &str, _at: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.kill_switches.insert(capsule_id.to_string());
        Ok(())
    }

    async fn kill_switch_set(&self, capsule_id: &str) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.kill_switches.contains(capsule_id))
    }
}
