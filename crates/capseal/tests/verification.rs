//! End-to-end verification scenarios against a fully wired Verifier.

use capseal::{
    ChainStatus, FailureMode, SignatureStatus, TranscriptMode, VerificationStatus, Verifier,
    VerifierConfig, VerifyOptions, VerifyRequest,
};
use capseal::core::{Capsule, CapsuleBuilder, Keypair, CANONICAL_VERSION};
use capseal::ledger::CheckpointSigner;
use capseal::registry::{KeyEntry, KeyRegistry, KeyStatus};
use capseal::store::{InsertOutcome, MemoryStore};

const CAPTURED_AT: i64 = 1736870400000;
const ACTOR: &str = "operator";

struct Harness {
    keypair: Keypair,
    verifier: Verifier<MemoryStore>,
}

fn harness() -> Harness {
    let keypair = Keypair::from_seed(&[0x42; 32]);
    let registry = KeyRegistry::new();
    registry
        .add_key(KeyEntry::active(
            "key-1",
            keypair.public_key().to_hex(),
            "issuer-1",
            "Issuer One",
            1,
        ))
        .unwrap();

    let mut revoked = KeyEntry::active(
        "key-revoked",
        keypair.public_key().to_hex(),
        "issuer-1",
        "Issuer One",
        1,
    );
    revoked.status = KeyStatus::Revoked;
    registry.add_key(revoked).unwrap();
    registry.trust_issuer("issuer-1");

    let verifier = Verifier::new(
        MemoryStore::new(),
        registry,
        CheckpointSigner::ephemeral(),
        VerifierConfig {
            checkpoint_interval: 0,
            transcript_mode: TranscriptMode::Redacted,
        },
    );

    Harness { keypair, verifier }
}

fn signed_capsule(keypair: &Keypair, id: &str, key_id: &str) -> Capsule {
    CapsuleBuilder::new(id, "demo-platform")
        .captured_at(CAPTURED_AT)
        .message("user", "what is 2+2?")
        .message("assistant", "4")
        .sign(keypair, key_id)
}

#[tokio::test]
async fn fully_valid_capsule_is_verified() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Verified);
    assert!(result.failure_modes.is_empty());

    let integrity = result.integrity.unwrap();
    assert!(integrity.hash_match);
    assert_eq!(integrity.computed_hash, integrity.declared_hash);

    let signature = result.signature.unwrap();
    assert_eq!(signature.status, SignatureStatus::Valid);
    assert_eq!(signature.issuer_label.as_deref(), Some("Issuer One"));

    let chain = result.chain.unwrap();
    assert_eq!(chain.status, ChainStatus::Genesis);

    let canonical = result.canonicalization.unwrap();
    assert_eq!(canonical.version, CANONICAL_VERSION);
    assert_eq!(canonical.message_count, 2);
}

#[tokio::test]
async fn tampered_content_reports_hash_mismatch_with_diagnostics() {
    let h = harness();
    let mut capsule = signed_capsule(&h.keypair, "c-1", "key-1");
    // Modify transcript content after signing; declared hash and
    // signature stay as submitted.
    capsule.transcript[1].content = "5".to_string();

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Unverified);
    assert_eq!(result.failure_modes, vec![FailureMode::HashMismatch]);

    // Signature and chain are still computed and reported.
    assert_eq!(result.signature.unwrap().status, SignatureStatus::Valid);
    assert_eq!(result.chain.unwrap().status, ChainStatus::Genesis);
    assert!(!result.integrity.unwrap().hash_match);
}

#[tokio::test]
async fn unsigned_capsule_is_partially_verified() {
    let h = harness();
    let capsule = CapsuleBuilder::new("c-1", "demo-platform")
        .captured_at(CAPTURED_AT)
        .message("user", "hi")
        .build_unsigned();

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::PartiallyVerified);
    assert_eq!(result.failure_modes, vec![FailureMode::NoSignature]);
    assert_eq!(
        result.signature.unwrap().status,
        SignatureStatus::NoSignature
    );
}

#[tokio::test]
async fn revoked_key_downgrades_to_partial() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-revoked");

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::PartiallyVerified);
    assert_eq!(result.failure_modes, vec![FailureMode::UntrustedIssuer]);
    let signature = result.signature.unwrap();
    assert_eq!(signature.status, SignatureStatus::UntrustedIssuer);
    assert_eq!(signature.key_status, Some(KeyStatus::Revoked));
}

#[tokio::test]
async fn corrupted_signature_is_unverified() {
    let h = harness();
    let mut capsule = signed_capsule(&h.keypair, "c-1", "key-1");
    let block = capsule.signature.as_mut().unwrap();
    block.value = "00".repeat(64);

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Unverified);
    assert_eq!(result.failure_modes, vec![FailureMode::BadSignature]);
}

#[tokio::test]
async fn bypass_never_verifies() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");

    let request = VerifyRequest {
        request_id: Some("req-1".to_string()),
        capsule,
        options: VerifyOptions {
            verify_signature: false,
            verify_chain: true,
        },
    };
    let result = h.verifier.verify_capsule(request, ACTOR).await.unwrap();

    assert_eq!(result.status, VerificationStatus::Unverified);
    assert_eq!(
        result.failure_modes,
        vec![FailureMode::SignatureNotVerified]
    );
    assert!(result.signature.is_none());
    assert_eq!(result.request_id.as_deref(), Some("req-1"));
}

#[tokio::test]
async fn skipped_chain_still_allows_verified() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");

    let request = VerifyRequest {
        request_id: None,
        capsule,
        options: VerifyOptions {
            verify_signature: true,
            verify_chain: false,
        },
    };
    let result = h.verifier.verify_capsule(request, ACTOR).await.unwrap();

    assert_eq!(result.status, VerificationStatus::Verified);
    let chain = result.chain.unwrap();
    assert_eq!(chain.status, ChainStatus::NotChecked);
    assert!(!chain.checked);
}

#[tokio::test]
async fn chain_links_to_submitted_predecessor() {
    let h = harness();
    let first = signed_capsule(&h.keypair, "c-1", "key-1");
    let first_hash = first.core_hash();

    let outcome = h.verifier.submit_capsule(first, ACTOR).await.unwrap();
    assert!(matches!(outcome, InsertOutcome::Inserted(_)));

    let second = CapsuleBuilder::new("c-2", "demo-platform")
        .captured_at(CAPTURED_AT + 1000)
        .message("user", "and 3+3?")
        .message("assistant", "6")
        .prev(&first_hash)
        .sign(&h.keypair, "key-1");

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(second), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Verified);
    let chain = result.chain.unwrap();
    assert_eq!(chain.status, ChainStatus::Linked);
    assert_eq!(chain.link_match, Some(true));
    assert_eq!(chain.previous_capsule_id.as_deref(), Some("c-1"));
}

#[tokio::test]
async fn unknown_previous_hash_breaks_the_chain() {
    let h = harness();
    let capsule = CapsuleBuilder::new("c-2", "demo-platform")
        .captured_at(CAPTURED_AT)
        .message("user", "hi")
        .prev(&capseal::Sha256Hash::from_bytes([0x99; 32]))
        .sign(&h.keypair, "key-1");

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Unverified);
    assert_eq!(result.failure_modes, vec![FailureMode::ChainBroken]);
}

#[tokio::test]
async fn unknown_canonicalization_version_fails_closed() {
    let h = harness();
    let mut capsule = signed_capsule(&h.keypair, "c-1", "key-1");
    capsule.canonicalization_version = "ctv99".to_string();

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Unverified);
    assert_eq!(
        result.failure_modes,
        vec![FailureMode::UnknownCanonicalization]
    );
    // Nothing was computed: no hash, no signature check, no chain check.
    assert!(result.integrity.is_none());
    assert!(result.signature.is_none());
    assert!(result.chain.is_none());
    assert!(result.canonicalization.is_none());
}

#[tokio::test]
async fn malformed_capsule_degrades_to_bad_schema() {
    let h = harness();
    let mut capsule = signed_capsule(&h.keypair, "c-1", "key-1");
    capsule.transcript_hash = "not hex".to_string();

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Unverified);
    assert_eq!(result.failure_modes, vec![FailureMode::BadSchema]);
    assert!(result.schema_error.is_some());
}

#[tokio::test]
async fn downstream_lock_follows_status_and_kill_switch() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");

    let result = h
        .verifier
        .verify_capsule(VerifyRequest::new(capsule.clone()), ACTOR)
        .await
        .unwrap();
    assert!(h.verifier.downstream_unlocked(&result).await.unwrap());

    // An unverified capsule never unlocks.
    let mut tampered = capsule.clone();
    tampered.transcript[0].content.push('!');
    let bad = h
        .verifier
        .verify_capsule(VerifyRequest::new(tampered), ACTOR)
        .await
        .unwrap();
    assert!(!h.verifier.downstream_unlocked(&bad).await.unwrap());

    // The kill switch overrides even a VERIFIED verdict, permanently.
    h.verifier.set_kill_switch("c-1", ACTOR).await.unwrap();
    assert!(!h.verifier.downstream_unlocked(&result).await.unwrap());
}

#[tokio::test]
async fn duplicate_submission_is_idempotent() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");

    let first = h
        .verifier
        .submit_capsule(capsule.clone(), ACTOR)
        .await
        .unwrap();
    assert!(matches!(first, InsertOutcome::Inserted(_)));

    let second = h.verifier.submit_capsule(capsule, ACTOR).await.unwrap();
    assert_eq!(second, InsertOutcome::AlreadyExists);
}

#[tokio::test]
async fn proof_pack_is_content_free() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");
    h.verifier.submit_capsule(capsule, ACTOR).await.unwrap();

    let pack = h.verifier.proof_pack("c-1", ACTOR).await.unwrap();
    assert_eq!(pack.status, VerificationStatus::Verified);
    assert_eq!(pack.proof_scope, vec!["integrity", "signature", "chain"]);
    assert_eq!(
        pack.proof_scope_excludes,
        vec!["truth", "completeness", "authorship_intent"]
    );
    assert!(pack.audit_head.is_some());

    let json = serde_json::to_string(&pack).unwrap();
    assert!(!json.contains("what is 2+2?"));
    assert!(!json.contains("hello"));
}

#[tokio::test]
async fn transcript_view_respects_mode() {
    let h = harness();
    let capsule = signed_capsule(&h.keypair, "c-1", "key-1");
    h.verifier.submit_capsule(capsule, ACTOR).await.unwrap();

    match h.verifier.transcript_view("c-1").await.unwrap() {
        capseal::TranscriptView::Redacted { messages } => {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].role, "user");
        }
        other => panic!("expected redacted view, got {other:?}"),
    }
}
