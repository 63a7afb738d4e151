//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a deterministic signing
//! keypair, a registry populated with active/revoked/expired keys, and
//! capsule builders wired to them.

use capseal::{Verifier, VerifierConfig};
use capseal_core::{Capsule, CapsuleBuilder, Keypair};
use capseal_ledger::CheckpointSigner;
use capseal_registry::{KeyEntry, KeyRegistry, KeyStatus};
use capseal_store::MemoryStore;

/// Capture timestamp used by all fixture capsules.
pub const FIXTURE_CAPTURED_AT: i64 = 1736870400000;

/// The trusted issuer present in fixture registries.
pub const FIXTURE_ISSUER: &str = "issuer-1";

/// Key ids present in fixture registries.
pub const ACTIVE_KEY_ID: &str = "key-1";
pub const REVOKED_KEY_ID: &str = "key-revoked";
pub const EXPIRED_KEY_ID: &str = "key-expired";
pub const UNTRUSTED_KEY_ID: &str = "key-untrusted";

/// A test fixture with a deterministic keypair.
pub struct TestFixture {
    pub keypair: Keypair,
}

impl TestFixture {
    /// Create a fixture with the default seed.
    pub fn new() -> Self {
        Self::with_seed([0x42; 32])
    }

    /// Create with a specific seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
        }
    }

    /// A registry holding the fixture keypair under several governance
    /// states: `key-1` (active, trusted issuer), `key-revoked`,
    /// `key-expired`, and `key-untrusted` (active but from an issuer
    /// outside the trusted set).
    pub fn registry(&self) -> KeyRegistry {
        let registry = KeyRegistry::new();
        let public_key = self.keypair.public_key().to_hex();

        registry
            .add_key(KeyEntry::active(
                ACTIVE_KEY_ID,
                public_key.clone(),
                FIXTURE_ISSUER,
                "Issuer One",
                1,
            ))
            .expect("fresh registry");

        let mut revoked = KeyEntry::active(
            REVOKED_KEY_ID,
            public_key.clone(),
            FIXTURE_ISSUER,
            "Issuer One",
            1,
        );
        revoked.status = KeyStatus::Revoked;
        revoked.revocation_reason = Some("fixture revocation".to_string());
        registry.add_key(revoked).expect("fresh registry");

        let mut expired = KeyEntry::active(
            EXPIRED_KEY_ID,
            public_key.clone(),
            FIXTURE_ISSUER,
            "Issuer One",
            1,
        );
        expired.status = KeyStatus::Expired;
        registry.add_key(expired).expect("fresh registry");

        registry
            .add_key(KeyEntry::active(
                UNTRUSTED_KEY_ID,
                public_key,
                "issuer-unknown",
                "Unknown Issuer",
                1,
            ))
            .expect("fresh registry");

        registry.trust_issuer(FIXTURE_ISSUER);
        registry
    }

    /// A fully wired verifier over a fresh in-memory store, using an
    /// ephemeral checkpoint signer.
    pub fn verifier(&self, config: VerifierConfig) -> Verifier<MemoryStore> {
        Verifier::new(
            MemoryStore::new(),
            self.registry(),
            CheckpointSigner::ephemeral(),
            config,
        )
    }

    /// A capsule signed with the active trusted key.
    pub fn signed_capsule(&self, capsule_id: &str) -> Capsule {
        self.capsule_builder(capsule_id)
            .sign(&self.keypair, ACTIVE_KEY_ID)
    }

    /// A capsule signed with a specific registry key id.
    pub fn signed_capsule_with_key(&self, capsule_id: &str, key_id: &str) -> Capsule {
        self.capsule_builder(capsule_id).sign(&self.keypair, key_id)
    }

    /// An unsigned capsule.
    pub fn unsigned_capsule(&self, capsule_id: &str) -> Capsule {
        self.capsule_builder(capsule_id).build_unsigned()
    }

    /// A signed capsule chained to a predecessor.
    pub fn chained_capsule(&self, capsule_id: &str, prev: &Capsule) -> Capsule {
        self.capsule_builder(capsule_id)
            .prev(&prev.core_hash())
            .sign(&self.keypair, ACTIVE_KEY_ID)
    }

    fn capsule_builder(&self, capsule_id: &str) -> CapsuleBuilder {
        CapsuleBuilder::new(capsule_id, "demo-platform")
            .captured_at(FIXTURE_CAPTURED_AT)
            .message("user", format!("hello from {}", capsule_id))
            .message("assistant", "hello back")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capseal_registry::SignatureStatus;

    #[test]
    fn test_fixture_registry_states() {
        let fixture = TestFixture::new();
        let registry = fixture.registry();

        assert_eq!(
            registry.resolve(ACTIVE_KEY_ID).unwrap().status,
            KeyStatus::Active
        );
        assert_eq!(
            registry.resolve(REVOKED_KEY_ID).unwrap().status,
            KeyStatus::Revoked
        );
        assert!(registry.is_trusted(FIXTURE_ISSUER));
        assert!(!registry.is_trusted("issuer-unknown"));
    }

    #[test]
    fn test_fixture_capsule_verifies_against_registry() {
        let fixture = TestFixture::new();
        let registry = fixture.registry();
        let capsule = fixture.signed_capsule("c-1");

        let check = registry.verify(
            &capsule.signed_message(),
            capsule.signature.as_ref(),
            FIXTURE_CAPTURED_AT,
        );
        assert_eq!(check.status, SignatureStatus::Valid);
    }

    #[tokio::test]
    async fn test_fixture_verifier_verifies_end_to_end() {
        use capseal::{VerificationStatus, VerifierConfig, VerifyRequest};

        let fixture = TestFixture::new();
        let verifier = fixture.verifier(VerifierConfig::default());
        let capsule = fixture.signed_capsule("c-1");

        let result = verifier
            .verify_capsule(VerifyRequest::new(capsule), "operator")
            .await
            .unwrap();
        assert_eq!(result.status, VerificationStatus::Verified);
    }

    #[test]
    fn test_chained_capsule_links() {
        let fixture = TestFixture::new();
        let first = fixture.signed_capsule("c-1");
        let second = fixture.chained_capsule("c-2", &first);
        assert_eq!(
            second.previous_hash.as_deref(),
            Some(first.core_hash().to_hex().as_str())
        );
    }
}
