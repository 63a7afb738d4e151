//! # capseal-core
//!
//! Pure primitives for capseal: capsules, transcript canonicalization, and
//! core hashing.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Capsule`] - A submitted AI conversation receipt
//! - [`CapsuleCore`] - The immutable identity subset used for chain links
//! - [`CanonicalTranscript`] - The deterministic hash input for a transcript
//! - [`Sha256Hash`] - Content address of transcripts, cores and audit events
//!
//! ## Canonicalization
//!
//! Transcripts are encoded as one exact byte string before hashing. See the
//! [`canonical`] module.

pub mod canonical;
pub mod capsule;
pub mod crypto;
pub mod error;
pub mod schema;

pub use canonical::{
    canonical_kv, canonicalize, canonicalize_versioned, is_supported_version,
    CanonicalTranscript, CANONICAL_VERSION, HASHED_FIELDS,
};
pub use capsule::{
    Capsule, CapsuleBuilder, CapsuleCore, Message, SignatureBlock, CAPSULE_SCHEMA,
    SIGNATURE_ALGORITHM,
};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, Sha256Hash};
pub use error::{CoreError, SchemaError};
pub use schema::validate_capsule;
