//! Capsule: a submitted AI conversation receipt.
//!
//! A capsule is immutable once submitted. It carries the transcript, the
//! declared transcript hash, an optional signature and an optional link to
//! the previous capsule's core hash.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_kv, canonicalize};
use crate::crypto::{Keypair, Sha256Hash};

/// The current capsule schema tag.
pub const CAPSULE_SCHEMA: &str = "capseal.capsule/v1";

/// The only signature algorithm accepted.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// One transcript message. Any other field a platform attaches to its
/// messages is dropped before hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker role, free-form ("user", "assistant", "system", ...).
    pub role: String,
    /// Message content, taken verbatim.
    pub content: String,
}

impl Message {
    /// Convenience constructor.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Detached signature metadata attached to a capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Signature algorithm label ("ed25519").
    pub algorithm: String,
    /// Registry id of the public key that produced the signature.
    pub public_key_id: String,
    /// Hex-encoded signature bytes.
    pub value: String,
}

/// A submitted receipt: transcript plus integrity/signature metadata.
///
/// Immutable once submitted. Changes are new capsules chained via
/// `previous_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    /// Schema tag (currently `capseal.capsule/v1`).
    pub schema: String,

    /// Platform-assigned receipt identifier.
    pub capsule_id: String,

    /// Label of the platform that captured the conversation.
    pub platform: String,

    /// Capture timestamp (Unix milliseconds). Submitter-claimed, untrusted.
    pub captured_at: i64,

    /// Declared canonicalization version tag.
    pub canonicalization_version: String,

    /// The transcript messages, in conversation order.
    pub transcript: Vec<Message>,

    /// Declared SHA-256 hex digest of the canonical transcript.
    pub transcript_hash: String,

    /// Optional detached signature over the declared transcript hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBlock>,

    /// Optional core hash of the predecessor capsule (hex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
}

impl Capsule {
    /// Project the immutable identity fields out of this capsule.
    pub fn core(&self) -> CapsuleCore {
        CapsuleCore {
            schema: self.schema.clone(),
            capsule_id: self.capsule_id.clone(),
            platform: self.platform.clone(),
            captured_at: self.captured_at,
            transcript_hash: self.transcript_hash.clone(),
            canonicalization_version: self.canonicalization_version.clone(),
            previous_hash: self.previous_hash.clone(),
            public_key_id: self.signature.as_ref().map(|s| s.public_key_id.clone()),
        }
    }

    /// The capsule's chain-link identity hash.
    pub fn core_hash(&self) -> Sha256Hash {
        self.core().hash()
    }

    /// The bytes a capsule signature is computed over: the UTF-8 bytes of
    /// the declared transcript hash hex digest. Content-free, so the
    /// signature stays verifiable when the transcript itself is withheld.
    pub fn signed_message(&self) -> Vec<u8> {
        self.transcript_hash.as_bytes().to_vec()
    }
}

/// The subset of capsule fields that define its cryptographic identity.
///
/// Used only to compute the capsule's own chain-link hash. The raw
/// transcript never enters this hash, only its digest: chain links are
/// content-addressed but content is never exposed in the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleCore {
    pub schema: String,
    pub capsule_id: String,
    pub platform: String,
    pub captured_at: i64,
    pub transcript_hash: String,
    pub canonicalization_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_id: Option<String>,
}

impl CapsuleCore {
    /// SHA-256 over the key-sorted flat serialization of the present
    /// fields. Absent optionals are omitted, not null-padded, so adding an
    /// unused optional field never changes unrelated hashes.
    pub fn hash(&self) -> Sha256Hash {
        let mut fields = vec![
            ("schema", self.schema.clone()),
            ("capsule_id", self.capsule_id.clone()),
            ("platform", self.platform.clone()),
            ("captured_at", self.captured_at.to_string()),
            ("transcript_hash", self.transcript_hash.clone()),
            (
                "canonicalization_version",
                self.canonicalization_version.clone(),
            ),
        ];
        if let Some(prev) = &self.previous_hash {
            fields.push(("previous_hash", prev.clone()));
        }
        if let Some(key_id) = &self.public_key_id {
            fields.push(("public_key_id", key_id.clone()));
        }

        Sha256Hash::hash(canonical_kv(&fields).as_bytes())
    }
}

/// Builder for creating capsules.
pub struct CapsuleBuilder {
    capsule_id: String,
    platform: String,
    captured_at: i64,
    messages: Vec<Message>,
    previous_hash: Option<String>,
}

impl CapsuleBuilder {
    /// Start building a capsule.
    pub fn new(capsule_id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            capsule_id: capsule_id.into(),
            platform: platform.into(),
            captured_at: 0,
            messages: Vec::new(),
            previous_hash: None,
        }
    }

    /// Set the capture timestamp.
    pub fn captured_at(mut self, ts: i64) -> Self {
        self.captured_at = ts;
        self
    }

    /// Append a transcript message.
    pub fn message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(Message::new(role, content));
        self
    }

    /// Link to a predecessor capsule's core hash.
    pub fn prev(mut self, previous_hash: &Sha256Hash) -> Self {
        self.previous_hash = Some(previous_hash.to_hex());
        self
    }

    /// Build an unsigned capsule with an honest transcript hash.
    pub fn build_unsigned(self) -> Capsule {
        let transcript_hash = canonicalize(&self.messages).hash().to_hex();
        Capsule {
            schema: CAPSULE_SCHEMA.to_string(),
            capsule_id: self.capsule_id,
            platform: self.platform,
            captured_at: self.captured_at,
            canonicalization_version: crate::canonical::CANONICAL_VERSION.to_string(),
            transcript: self.messages,
            transcript_hash,
            signature: None,
            previous_hash: self.previous_hash,
        }
    }

    /// Build and sign the capsule with the given key.
    pub fn sign(self, keypair: &Keypair, public_key_id: impl Into<String>) -> Capsule {
        let mut capsule = self.build_unsigned();
        let signature = keypair.sign(&capsule.signed_message());
        capsule.signature = Some(SignatureBlock {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            public_key_id: public_key_id.into(),
            value: signature.to_hex(),
        });
        capsule
    }
}
