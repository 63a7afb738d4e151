//! # capseal
//!
//! The unified API for capseal - cryptographic verification of AI
//! conversation receipts with a tamper-evident audit trail.
//!
//! ## Overview
//!
//! capseal lets a third party verify that a submitted conversation receipt
//! is unmodified, correctly signed, and correctly chained to a prior
//! receipt - without asserting anything about the truth of the
//! conversation's content:
//!
//! - **Capsules**: Immutable submitted receipts (transcript + metadata)
//! - **Verification**: Deterministic hash/signature/chain checks combined
//!   into one reproducible verdict
//! - **Audit ledger**: Append-only, hash-chained record of every action,
//!   anchored by periodically signed checkpoints
//! - **Disclosure**: Content-free proof packs and mode-gated transcript
//!   views
//!
//! ## Key Concepts
//!
//! - **Capsule**: Immutable. Never edited. Changes are new capsules.
//! - **Core hash**: Content-addressed capsule identity; the chain link.
//! - **Verdict**: VERIFIED, PARTIALLY_VERIFIED or UNVERIFIED, plus failure
//!   modes. Always returned, even for malformed input.
//! - **Kill switch**: Set-once flag that permanently blocks downstream use
//!   of a capsule regardless of its verdict.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use capseal::{Verifier, VerifierConfig, VerifyRequest};
//! use capseal::ledger::CheckpointSigner;
//! use capseal::registry::KeyRegistry;
//! use capseal::store::SqliteStore;
//! use capseal::core::CapsuleBuilder;
//!
//! async fn example() {
//!     let store = SqliteStore::open("capseal.db").unwrap();
//!     let registry = KeyRegistry::new();
//!     let signer = CheckpointSigner::ephemeral();
//!
//!     let verifier = Verifier::new(store, registry, signer, VerifierConfig::default());
//!
//!     let capsule = CapsuleBuilder::new("c-1", "demo-platform")
//!         .captured_at(1736870400000)
//!         .message("user", "hello")
//!         .build_unsigned();
//!
//!     let result = verifier
//!         .verify_capsule(VerifyRequest::new(capsule), "operator")
//!         .await
//!         .unwrap();
//!     println!("{}", result.status);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `capseal::core` - Core primitives (Capsule, canonicalization, crypto)
//! - `capseal::registry` - Key governance and signature checking
//! - `capseal::ledger` - Audit events and checkpoints
//! - `capseal::store` - Storage abstraction, SQLite and memory backends

pub mod audit;
pub mod chain;
pub mod disclosure;
pub mod engine;
pub mod error;
pub mod service;

// Re-export component crates
pub use capseal_core as core;
pub use capseal_ledger as ledger;
pub use capseal_registry as registry;
pub use capseal_store as store;

// Re-export main types for convenience
pub use audit::AuditLedger;
pub use chain::{ChainCheck, ChainLinker, ChainStatus};
pub use disclosure::{
    DisclosurePolicy, ProofPack, TranscriptMode, TranscriptView, PROOF_SCOPE,
    PROOF_SCOPE_EXCLUDES,
};
pub use engine::{
    decide, CanonicalizationInfo, FailureMode, IntegrityCheck, VerificationResult,
    VerificationStatus, VerifyOptions, VerifyRequest,
};
pub use error::{KernelError, Result};
pub use service::{Verifier, VerifierConfig};

// Re-export commonly used component types
pub use capseal_core::{
    Capsule, CapsuleBuilder, CapsuleCore, Keypair, Message, Sha256Hash, SignatureBlock,
};
pub use capseal_ledger::{
    AuditAction, AuditEvent, Checkpoint, CheckpointSigner, Environment, LedgerVerification,
};
pub use capseal_registry::{KeyEntry, KeyRegistry, KeyStatus, SignatureCheck, SignatureStatus};
