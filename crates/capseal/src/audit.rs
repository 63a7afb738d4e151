//! Store-backed audit ledger with a single-writer append discipline.
//!
//! Each new event's `previous_hash` is read from the current head, so
//! concurrent appends racing on the same head could fork the chain. The
//! append path is serialized with an async mutex; the store additionally
//! rejects a second event at an occupied sequence number, so even a buggy
//! caller cannot attach two successors to one head.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use capseal_ledger::{verify_events, AuditAction, AuditEvent, LedgerVerification, GENESIS};
use capseal_store::Store;

use crate::error::{KernelError, Result};

/// The append-only, hash-chained record of administrative and
/// verification actions.
pub struct AuditLedger<S: Store> {
    store: Arc<S>,
    append_lock: Mutex<()>,
}

impl<S: Store> AuditLedger<S> {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
        }
    }

    /// Append an event and durably store it before returning.
    ///
    /// Persistence failure is fatal to the request and is not retried:
    /// a retry against a moved head could append two competing
    /// successors.
    pub async fn append(
        &self,
        action: AuditAction,
        actor: &str,
        context: &str,
        recorded_at: i64,
    ) -> Result<AuditEvent> {
        let _guard = self.append_lock.lock().await;

        let head = self.store.latest_audit_event().await?;
        let (seq, previous_hash) = match &head {
            Some(event) => (event.seq + 1, event.compute_hash().to_hex()),
            None => (1, GENESIS.to_string()),
        };

        let event = AuditEvent::build(seq, action, actor, context, previous_hash, recorded_at);
        self.store.append_audit_event(&event).await?;
        debug!(seq, action = %action, "audit event appended");
        Ok(event)
    }

    /// The current head event.
    pub async fn head(&self) -> Result<Option<AuditEvent>> {
        Ok(self.store.latest_audit_event().await?)
    }

    /// Replay a range of the ledger, recomputing every hash.
    ///
    /// `range` defaults to the whole ledger. With a range starting past
    /// the first event, the predecessor event anchors the replay.
    pub async fn verify(
        &self,
        range: Option<(u64, u64)>,
        strict: bool,
    ) -> Result<LedgerVerification> {
        let total = self.store.audit_event_count().await?;

        let (from, to) = match range {
            Some((from, to)) => (from, to),
            None => (1, total.max(1)),
        };
        if from == 0 || to < from {
            return Err(KernelError::InvalidRange { from, to });
        }

        let expected_prev = if from == 1 {
            GENESIS.to_string()
        } else {
            let anchor = self
                .store
                .get_audit_event(from - 1)
                .await?
                .ok_or(KernelError::InvalidRange { from, to })?;
            anchor.compute_hash().to_hex()
        };

        let events = self.store.get_audit_events(from, to).await?;
        Ok(verify_events(&expected_prev, &events, strict, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capseal_ledger::LedgerStatus;
    use capseal_store::MemoryStore;

    async fn ledger_with_events(n: u64) -> (AuditLedger<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = AuditLedger::new(Arc::clone(&store));
        for i in 1..=n {
            ledger
                .append(
                    AuditAction::CapsuleVerified,
                    "operator",
                    &format!("{{\"n\":{}}}", i),
                    1736870400000 + i as i64,
                )
                .await
                .unwrap();
        }
        (ledger, store)
    }

    #[tokio::test]
    async fn test_append_chains_events() {
        let (ledger, _) = ledger_with_events(3).await;
        let head = ledger.head().await.unwrap().unwrap();
        assert_eq!(head.seq, 3);

        let result = ledger.verify(None, true).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.status, LedgerStatus::Intact);
        assert_eq!(result.checked, 3);
    }

    #[tokio::test]
    async fn test_first_event_is_genesis() {
        let (_ledger, store) = ledger_with_events(1).await;
        let event = store.get_audit_event(1).await.unwrap().unwrap();
        assert_eq!(event.previous_hash, GENESIS);
    }

    #[tokio::test]
    async fn test_range_verification_uses_anchor() {
        let (ledger, _) = ledger_with_events(5).await;
        let result = ledger.verify(Some((3, 5)), true).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.checked, 3);
        assert_eq!(result.total_events, 5);
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let (ledger, _) = ledger_with_events(2).await;
        assert!(matches!(
            ledger.verify(Some((0, 2)), true).await,
            Err(KernelError::InvalidRange { .. })
        ));
        assert!(matches!(
            ledger.verify(Some((2, 1)), true).await,
            Err(KernelError::InvalidRange { .. })
        ));
        // Range anchored at a missing predecessor.
        assert!(matches!(
            ledger.verify(Some((10, 12)), true).await,
            Err(KernelError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_appends_never_fork() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(AuditLedger::new(Arc::clone(&store)));

        let mut handles = Vec::new();
        for i in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .append(
                        AuditAction::KeyAdded,
                        "op",
                        &format!("{{\"i\":{}}}", i),
                        1736870400000 + i,
                    )
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let result = ledger.verify(None, true).await.unwrap();
        assert!(result.ok, "concurrent appends forked the chain: {result:?}");
        assert_eq!(result.checked, 16);
    }
}
