//! Audit events: the append-only, hash-chained record of every
//! administrative and verification action.
//!
//! An event is immutable once appended. Each event's hash covers the
//! previous event's hash, so modifying or deleting any past event without
//! recomputing every successor is detectable by replay.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use capseal_core::{canonical_kv, Sha256Hash};

/// Sentinel `previous_hash` of the first event in a ledger.
pub const GENESIS: &str = "GENESIS";

/// The auditable actions this core performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    CapsuleSubmitted,
    CapsuleVerified,
    KeyAdded,
    KeyRevoked,
    KeyRemoved,
    IssuerTrusted,
    KillSwitchSet,
    LedgerVerified,
}

impl AuditAction {
    /// Stable string form used in hashes and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CapsuleSubmitted => "capsule.submitted",
            AuditAction::CapsuleVerified => "capsule.verified",
            AuditAction::KeyAdded => "key.added",
            AuditAction::KeyRevoked => "key.revoked",
            AuditAction::KeyRemoved => "key.removed",
            AuditAction::IssuerTrusted => "issuer.trusted",
            AuditAction::KillSwitchSet => "kill_switch.set",
            AuditAction::LedgerVerified => "ledger.verified",
        }
    }

    /// Parse from the stable string form.
    pub fn from_str_tag(s: &str) -> Option<Self> {
        match s {
            "capsule.submitted" => Some(AuditAction::CapsuleSubmitted),
            "capsule.verified" => Some(AuditAction::CapsuleVerified),
            "key.added" => Some(AuditAction::KeyAdded),
            "key.revoked" => Some(AuditAction::KeyRevoked),
            "key.removed" => Some(AuditAction::KeyRemoved),
            "issuer.trusted" => Some(AuditAction::IssuerTrusted),
            "kill_switch.set" => Some(AuditAction::KillSwitchSet),
            "ledger.verified" => Some(AuditAction::LedgerVerified),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the audit ledger.
///
/// Actor and context are stored only as SHA-256 digests: the ledger is
/// tamper-evident without retaining raw identities or payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Strictly increasing, gap-free sequence number (1-indexed).
    pub seq: u64,

    /// What happened.
    pub action: AuditAction,

    /// SHA-256 hex digest of the acting principal.
    pub actor_hash: String,

    /// SHA-256 hex digest of the action context payload.
    pub context_hash: String,

    /// SHA-256 hex digest of this event's own payload fields.
    pub content_hash: String,

    /// Hash of the previous event, or [`GENESIS`] for the first event.
    pub previous_hash: String,

    /// When the event was recorded (Unix milliseconds).
    pub recorded_at: i64,
}

impl AuditEvent {
    /// Build a new event from raw actor/context strings, hashing them
    /// before they ever touch the record.
    pub fn build(
        seq: u64,
        action: AuditAction,
        actor: &str,
        context: &str,
        previous_hash: String,
        recorded_at: i64,
    ) -> Self {
        let actor_hash = Sha256Hash::hash(actor.as_bytes()).to_hex();
        let context_hash = Sha256Hash::hash(context.as_bytes()).to_hex();
        let content_hash =
            Self::content_hash_of(seq, action, &actor_hash, &context_hash, recorded_at);
        Self {
            seq,
            action,
            actor_hash,
            context_hash,
            content_hash,
            previous_hash,
            recorded_at,
        }
    }

    /// Hash of the event's payload fields, excluding the chain link.
    pub fn content_hash_of(
        seq: u64,
        action: AuditAction,
        actor_hash: &str,
        context_hash: &str,
        recorded_at: i64,
    ) -> String {
        let fields = vec![
            ("seq", seq.to_string()),
            ("action", action.as_str().to_string()),
            ("actor_hash", actor_hash.to_string()),
            ("context_hash", context_hash.to_string()),
            ("recorded_at", recorded_at.to_string()),
        ];
        Sha256Hash::hash(canonical_kv(&fields).as_bytes()).to_hex()
    }

    /// The event's chain hash: covers every field including
    /// `previous_hash`, which is what makes the ledger a chain.
    pub fn compute_hash(&self) -> Sha256Hash {
        let fields = vec![
            ("seq", self.seq.to_string()),
            ("action", self.action.as_str().to_string()),
            ("actor_hash", self.actor_hash.clone()),
            ("context_hash", self.context_hash.clone()),
            ("content_hash", self.content_hash.clone()),
            ("previous_hash", self.previous_hash.clone()),
            ("recorded_at", self.recorded_at.to_string()),
        ];
        Sha256Hash::hash(canonical_kv(&fields).as_bytes())
    }
}

/// Status of a ledger verification replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerStatus {
    /// Every checked event's hashes are consistent.
    Intact,
    /// At least one event is inconsistent with the chain.
    Tampered,
    /// Nothing to check.
    Empty,
}

/// Result of replaying a ledger range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub ok: bool,
    pub status: LedgerStatus,
    /// How many events were actually examined.
    pub checked: u64,
    /// Total events in the ledger at verification time.
    pub total_events: u64,
    /// Earliest sequence whose stored bytes are inconsistent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_bad_seq: Option<u64>,
}

/// Replay `events` (ascending, contiguous seq order) against the chain.
///
/// `expected_prev` is what the first event's `previous_hash` must equal:
/// [`GENESIS`] when the range starts at the ledger head, otherwise the
/// recomputed hash of the event just before the range.
///
/// In strict mode the first mismatch stops the replay; otherwise the
/// replay continues and reports a partial result with the earliest bad
/// sequence. A mutated event `k` is reported as `first_bad_seq = k`.
pub fn verify_events(
    expected_prev: &str,
    events: &[AuditEvent],
    strict: bool,
    total_events: u64,
) -> LedgerVerification {
    if events.is_empty() {
        return LedgerVerification {
            ok: true,
            status: LedgerStatus::Empty,
            checked: 0,
            total_events,
            first_bad_seq: None,
        };
    }

    let mut expected_prev = expected_prev.to_string();
    let mut expected_seq = events[0].seq;
    let mut first_bad_seq: Option<u64> = None;
    let mut checked: u64 = 0;

    for event in events {
        checked += 1;

        let recomputed_content = AuditEvent::content_hash_of(
            event.seq,
            event.action,
            &event.actor_hash,
            &event.context_hash,
            event.recorded_at,
        );

        let bad = event.seq != expected_seq
            || recomputed_content != event.content_hash
            || event.previous_hash != expected_prev;

        if bad && first_bad_seq.is_none() {
            warn!(seq = event.seq, "audit ledger inconsistency detected");
            first_bad_seq = Some(event.seq);
            if strict {
                break;
            }
        }

        // Continue the chain from the stored bytes so a single mutation
        // does not cascade blame onto every later event.
        expected_prev = event.compute_hash().to_hex();
        expected_seq = event.seq + 1;
    }

    let ok = first_bad_seq.is_none();
    LedgerVerification {
        ok,
        status: if ok {
            LedgerStatus::Intact
        } else {
            LedgerStatus::Tampered
        },
        checked,
        total_events,
        first_bad_seq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: u64) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        let mut prev = GENESIS.to_string();
        for seq in 1..=n {
            let event = AuditEvent::build(
                seq,
                AuditAction::CapsuleVerified,
                "operator",
                &format!("{{\"capsule_id\":\"c-{}\"}}", seq),
                prev,
                1736870400000 + seq as i64,
            );
            prev = event.compute_hash().to_hex();
            events.push(event);
        }
        events
    }

    #[test]
    fn test_intact_chain_verifies() {
        let events = chain(5);
        let result = verify_events(GENESIS, &events, true, 5);
        assert!(result.ok);
        assert_eq!(result.status, LedgerStatus::Intact);
        assert_eq!(result.checked, 5);
        assert_eq!(result.first_bad_seq, None);
    }

    #[test]
    fn test_empty_ledger() {
        let result = verify_events(GENESIS, &[], true, 0);
        assert!(result.ok);
        assert_eq!(result.status, LedgerStatus::Empty);
    }

    #[test]
    fn test_mutated_event_detected_at_its_seq() {
        let mut events = chain(5);
        // Tamper with event 3's context hash without recomputing anything.
        events[2].context_hash = "00".repeat(32);

        let result = verify_events(GENESIS, &events, true, 5);
        assert!(!result.ok);
        assert_eq!(result.status, LedgerStatus::Tampered);
        assert_eq!(result.first_bad_seq, Some(3));
        // Strict mode stops at the mismatch.
        assert_eq!(result.checked, 3);
    }

    #[test]
    fn test_non_strict_continues_past_mismatch() {
        let mut events = chain(5);
        events[2].context_hash = "00".repeat(32);

        let result = verify_events(GENESIS, &events, false, 5);
        assert!(!result.ok);
        assert_eq!(result.first_bad_seq, Some(3));
        assert_eq!(result.checked, 5);
    }

    #[test]
    fn test_rewritten_link_detected() {
        let mut events = chain(4);
        // Point event 2 at a forged predecessor.
        events[1].previous_hash = "ff".repeat(32);

        let result = verify_events(GENESIS, &events, true, 4);
        assert_eq!(result.first_bad_seq, Some(2));
    }

    #[test]
    fn test_deleted_event_detected_as_gap() {
        let mut events = chain(4);
        events.remove(1); // drop seq 2

        let result = verify_events(GENESIS, &events, true, 3);
        assert!(!result.ok);
        assert_eq!(result.first_bad_seq, Some(3));
    }

    #[test]
    fn test_genesis_required_for_first_event() {
        let mut events = chain(2);
        events[0].previous_hash = "aa".repeat(32);

        let result = verify_events(GENESIS, &events, true, 2);
        assert_eq!(result.first_bad_seq, Some(1));
    }

    #[test]
    fn test_action_tag_roundtrip() {
        for action in [
            AuditAction::CapsuleSubmitted,
            AuditAction::CapsuleVerified,
            AuditAction::KeyAdded,
            AuditAction::KeyRevoked,
            AuditAction::KeyRemoved,
            AuditAction::IssuerTrusted,
            AuditAction::KillSwitchSet,
            AuditAction::LedgerVerified,
        ] {
            assert_eq!(AuditAction::from_str_tag(action.as_str()), Some(action));
        }
    }

    #[test]
    fn test_actor_never_stored_raw() {
        let event = AuditEvent::build(
            1,
            AuditAction::KeyAdded,
            "alice@example.com",
            "{}",
            GENESIS.to_string(),
            1,
        );
        assert!(!event.actor_hash.contains("alice"));
        assert_eq!(event.actor_hash.len(), 64);
    }
}
