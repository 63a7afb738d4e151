//! The Verifier: unified API for the capseal system.
//!
//! One long-lived context owns the key registry, the checkpoint signer,
//! the audit ledger and the store handle. There are no module-level
//! globals; tests instantiate independent verifiers freely.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use capseal_core::{
    canonicalize_versioned, validate_capsule, Capsule, Ed25519PublicKey,
};
use capseal_ledger::{
    verify_checkpoint_chain, AuditAction, AuditEvent, Checkpoint, CheckpointChainVerification,
    CheckpointSigner, LedgerVerification,
};
use capseal_registry::{KeyEntry, KeyRegistry};
use capseal_store::{InsertOutcome, Store};

use crate::audit::AuditLedger;
use crate::chain::ChainLinker;
use crate::disclosure::{DisclosurePolicy, ProofPack, TranscriptMode, TranscriptView};
use crate::engine::{
    decide, CanonicalizationInfo, FailureMode, IntegrityCheck, VerificationResult,
    VerificationStatus, VerifyRequest,
};
use crate::error::{KernelError, Result};

/// Configuration for the Verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// A checkpoint is created synchronously whenever an audit append
    /// crosses this event-count interval. Zero disables checkpointing.
    pub checkpoint_interval: u64,
    /// Disclosure level for transcript views.
    pub transcript_mode: TranscriptMode,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 100,
            transcript_mode: TranscriptMode::Redacted,
        }
    }
}

/// The main Verifier struct.
///
/// Provides a unified API for:
/// - Submitting and querying capsules
/// - Verifying capsules (integrity, signature, chain)
/// - Key governance (add/revoke keys, trust issuers)
/// - Audit ledger verification and signed checkpoints
/// - Proof packs and transcript views
pub struct Verifier<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Governed key registry.
    registry: KeyRegistry,
    /// Environment-scoped checkpoint signer, initialized at startup.
    signer: CheckpointSigner,
    /// The audit ledger over the same store.
    ledger: AuditLedger<S>,
    /// Disclosure policy derived from config.
    disclosure: DisclosurePolicy,
    /// Configuration.
    config: VerifierConfig,
}

impl<S: Store> Verifier<S> {
    /// Create a new verifier instance.
    pub fn new(store: S, registry: KeyRegistry, signer: CheckpointSigner, config: VerifierConfig) -> Self {
        let store = Arc::new(store);
        let ledger = AuditLedger::new(Arc::clone(&store));
        let disclosure = DisclosurePolicy::new(config.transcript_mode);
        Self {
            store,
            registry,
            signer,
            ledger,
            disclosure,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the key registry.
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Get the disclosure policy.
    pub fn disclosure(&self) -> &DisclosurePolicy {
        &self.disclosure
    }

    // ─────────────────────────────────────────────────────────────────────
    // Capsule Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Submit a capsule for storage. Structurally malformed capsules are
    /// rejected, duplicates are idempotent, and accepted submissions are
    /// audited.
    pub async fn submit_capsule(&self, capsule: Capsule, actor: &str) -> Result<InsertOutcome> {
        validate_capsule(&capsule)?;

        let core_hash = capsule.core_hash().to_hex();
        let outcome = self
            .store
            .insert_capsule(&capsule, &core_hash, now_millis())
            .await?;

        if let InsertOutcome::Inserted(record) = &outcome {
            self.record(
                AuditAction::CapsuleSubmitted,
                actor,
                json!({
                    "capsule_id": record.capsule.capsule_id,
                    "core_hash": record.core_hash,
                }),
            )
            .await?;
        }

        Ok(outcome)
    }

    /// Get a stored capsule by id.
    pub async fn get_capsule(&self, capsule_id: &str) -> Result<Option<Capsule>> {
        Ok(self
            .store
            .get_capsule(capsule_id)
            .await?
            .map(|record| record.capsule))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────

    /// Verify a capsule.
    ///
    /// Always returns a result: schema errors and unsupported
    /// canonicalization versions degrade to UNVERIFIED outcomes, never
    /// exceptions. Only persistence faults (the audit append) error.
    pub async fn verify_capsule(
        &self,
        request: VerifyRequest,
        actor: &str,
    ) -> Result<VerificationResult> {
        let capsule = &request.capsule;
        let verified_at = now_millis();

        // Schema gate: a malformed capsule cannot be trusted enough to
        // hash, sign-check or chain-check.
        if let Err(schema_error) = validate_capsule(capsule) {
            let result = VerificationResult {
                request_id: request.request_id.clone(),
                capsule_id: capsule.capsule_id.clone(),
                status: VerificationStatus::Unverified,
                failure_modes: vec![FailureMode::BadSchema],
                integrity: None,
                signature: None,
                chain: None,
                canonicalization: None,
                schema_error: Some(schema_error.to_string()),
                verified_at,
            };
            self.audit_verification(&result, actor).await?;
            return Ok(result);
        }

        // Canonicalization gate: an unknown version aborts before any
        // hash is computed. Fail closed, not best-effort.
        let canonical = match canonicalize_versioned(
            &capsule.canonicalization_version,
            &capsule.transcript,
        ) {
            Ok(canonical) => canonical,
            Err(_) => {
                let result = VerificationResult {
                    request_id: request.request_id.clone(),
                    capsule_id: capsule.capsule_id.clone(),
                    status: VerificationStatus::Unverified,
                    failure_modes: vec![FailureMode::UnknownCanonicalization],
                    integrity: None,
                    signature: None,
                    chain: None,
                    canonicalization: None,
                    schema_error: None,
                    verified_at,
                };
                self.audit_verification(&result, actor).await?;
                return Ok(result);
            }
        };

        // Integrity: computed vs declared transcript hash.
        let computed_hash = canonical.hash().to_hex();
        let hash_match = computed_hash == capsule.transcript_hash;
        let integrity = IntegrityCheck {
            hash_match,
            computed_hash,
            declared_hash: capsule.transcript_hash.clone(),
        };

        // Signature, unless the caller bypassed it.
        let bypass = !request.options.verify_signature;
        let signature_check = if bypass {
            None
        } else {
            Some(self.registry.verify(
                &capsule.signed_message(),
                capsule.signature.as_ref(),
                verified_at,
            ))
        };

        // Chain, unless skipped by caller policy. Even when an earlier
        // check already failed, the sub-results are still computed and
        // reported for diagnostics.
        let chain_check = if request.options.verify_chain {
            let known = self.store.list_capsules().await?;
            ChainLinker::new(&known).link(capsule.previous_hash.as_deref())
        } else {
            ChainLinker::skipped()
        };

        let (status, failure_modes) = decide(
            hash_match,
            signature_check.as_ref().map(|c| c.status),
            chain_check.status,
            bypass,
        );

        let result = VerificationResult {
            request_id: request.request_id.clone(),
            capsule_id: capsule.capsule_id.clone(),
            status,
            failure_modes,
            integrity: Some(integrity),
            signature: signature_check,
            chain: Some(chain_check),
            canonicalization: Some(CanonicalizationInfo {
                version: canonical.version.to_string(),
                fields: canonical.fields.iter().map(|f| f.to_string()).collect(),
                message_count: canonical.message_count,
                byte_len: canonical.byte_len,
            }),
            schema_error: None,
            verified_at,
        };

        debug!(
            capsule_id = %result.capsule_id,
            status = %result.status,
            "capsule verified"
        );
        self.audit_verification(&result, actor).await?;
        Ok(result)
    }

    /// Whether a verification outcome unlocks downstream use of the
    /// capsule. The set-once kill switch permanently overrides any
    /// verdict.
    pub async fn downstream_unlocked(&self, result: &VerificationResult) -> Result<bool> {
        if self.store.kill_switch_set(&result.capsule_id).await? {
            return Ok(false);
        }
        Ok(result.unlocks_downstream())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Disclosure
    // ─────────────────────────────────────────────────────────────────────

    /// Build the public proof pack for a stored capsule: re-verify it and
    /// derive the content-free summaries, anchored at the audit head.
    pub async fn proof_pack(&self, capsule_id: &str, actor: &str) -> Result<ProofPack> {
        let record = self
            .store
            .get_capsule(capsule_id)
            .await?
            .ok_or_else(|| KernelError::CapsuleNotFound(capsule_id.to_string()))?;

        let result = self
            .verify_capsule(VerifyRequest::new(record.capsule), actor)
            .await?;
        let head = self.ledger.head().await?;
        Ok(self.disclosure.proof_pack(&result, head.as_ref()))
    }

    /// The mode-gated transcript view for a stored capsule.
    pub async fn transcript_view(&self, capsule_id: &str) -> Result<TranscriptView> {
        let record = self
            .store
            .get_capsule(capsule_id)
            .await?
            .ok_or_else(|| KernelError::CapsuleNotFound(capsule_id.to_string()))?;
        Ok(self.disclosure.transcript_view(&record.capsule))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Key Governance (audited)
    // ─────────────────────────────────────────────────────────────────────

    /// Register a key and audit the registration.
    pub async fn add_key(&self, entry: KeyEntry, actor: &str) -> Result<()> {
        let context = json!({
            "key_id": entry.key_id,
            "issuer_id": entry.issuer_id,
        });
        self.registry.add_key(entry)?;
        self.record(AuditAction::KeyAdded, actor, context).await?;
        Ok(())
    }

    /// Revoke a key and audit the revocation.
    pub async fn revoke_key(&self, key_id: &str, reason: &str, actor: &str) -> Result<()> {
        self.registry.revoke_key(key_id, reason)?;
        self.record(
            AuditAction::KeyRevoked,
            actor,
            json!({ "key_id": key_id, "reason": reason }),
        )
        .await?;
        Ok(())
    }

    /// Remove a key and audit the removal.
    pub async fn remove_key(&self, key_id: &str, actor: &str) -> Result<()> {
        self.registry.remove_key(key_id)?;
        self.record(AuditAction::KeyRemoved, actor, json!({ "key_id": key_id }))
            .await?;
        Ok(())
    }

    /// Trust an issuer and audit the change.
    pub async fn trust_issuer(&self, issuer_id: &str, actor: &str) -> Result<()> {
        self.registry.trust_issuer(issuer_id);
        self.record(
            AuditAction::IssuerTrusted,
            actor,
            json!({ "issuer_id": issuer_id }),
        )
        .await?;
        Ok(())
    }

    /// Set the kill switch for a capsule. Set-once; there is no unset.
    pub async fn set_kill_switch(&self, capsule_id: &str, actor: &str) -> Result<()> {
        self.store.set_kill_switch(capsule_id, now_millis()).await?;
        info!(capsule_id = %capsule_id, "kill switch set");
        self.record(
            AuditAction::KillSwitchSet,
            actor,
            json!({ "capsule_id": capsule_id }),
        )
        .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audit Ledger & Checkpoints
    // ─────────────────────────────────────────────────────────────────────

    /// Replay-verify the audit ledger (optionally a range), and audit the
    /// fact that the verification happened.
    pub async fn verify_audit_ledger(
        &self,
        range: Option<(u64, u64)>,
        strict: bool,
        actor: &str,
    ) -> Result<LedgerVerification> {
        let verification = self.ledger.verify(range, strict).await?;
        self.record(
            AuditAction::LedgerVerified,
            actor,
            json!({
                "ok": verification.ok,
                "checked": verification.checked,
                "first_bad_seq": verification.first_bad_seq,
            }),
        )
        .await?;
        Ok(verification)
    }

    /// All stored checkpoints in ascending counter order.
    pub async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        Ok(self.store.list_checkpoints().await?)
    }

    /// Verify the stored checkpoint chain against resolvable signer keys.
    pub async fn verify_checkpoints(&self) -> Result<CheckpointChainVerification> {
        let checkpoints = self.store.list_checkpoints().await?;

        let signer_key_id = self.signer.key_id().to_string();
        let signer_public_key = self.signer.public_key();
        let registry = &self.registry;
        let resolve = move |key_id: &str| -> Option<Ed25519PublicKey> {
            if key_id == signer_key_id {
                return Some(signer_public_key);
            }
            registry
                .resolve(key_id)
                .and_then(|entry| Ed25519PublicKey::from_hex(&entry.public_key).ok())
        };

        Ok(verify_checkpoint_chain(&checkpoints, resolve))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Audit one verification outcome.
    async fn audit_verification(&self, result: &VerificationResult, actor: &str) -> Result<()> {
        self.record(
            AuditAction::CapsuleVerified,
            actor,
            json!({
                "capsule_id": result.capsule_id,
                "request_id": result.request_id,
                "status": result.status.as_str(),
                "failure_modes": result
                    .failure_modes
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>(),
            }),
        )
        .await?;
        Ok(())
    }

    /// Append an audit event, creating a checkpoint when the append
    /// crosses the configured interval. The trigger is synchronous; this
    /// core runs no background scheduler.
    async fn record(
        &self,
        action: AuditAction,
        actor: &str,
        context: serde_json::Value,
    ) -> Result<AuditEvent> {
        let event = self
            .ledger
            .append(action, actor, &context.to_string(), now_millis())
            .await?;

        if self.config.checkpoint_interval > 0 && event.seq % self.config.checkpoint_interval == 0
        {
            self.create_checkpoint(&event).await?;
        }

        Ok(event)
    }

    /// Sign and store a checkpoint anchored at the given event.
    async fn create_checkpoint(&self, event: &AuditEvent) -> Result<Checkpoint> {
        let prev = self.store.latest_checkpoint().await?;
        let checkpoint = self.signer.checkpoint(
            event.seq,
            &event.compute_hash().to_hex(),
            event.seq,
            prev.as_ref(),
            now_millis(),
        );
        self.store.append_checkpoint(&checkpoint).await?;
        info!(
            counter = checkpoint.counter,
            event_seq = checkpoint.event_seq,
            environment = %checkpoint.environment,
            "checkpoint created"
        );
        Ok(checkpoint)
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
