//! # capseal-ledger
//!
//! Hash-chained audit events and signed checkpoints.
//!
//! Every administrative and verification action is recorded as an
//! [`AuditEvent`] whose hash depends on its predecessor's hash, so the
//! history of verification conclusions is itself tamper-evident. A
//! [`CheckpointSigner`] periodically anchors the ledger prefix with one
//! Ed25519 signature so long histories can be spot-verified without a full
//! replay.
//!
//! This crate is pure computation: the single-writer append discipline and
//! storage live in the facade crate.

pub mod checkpoint;
pub mod error;
pub mod event;

pub use checkpoint::{
    verify_checkpoint_chain, Checkpoint, CheckpointChainVerification, CheckpointSigner,
    Environment, CHECKPOINT_VERSION,
};
pub use error::LedgerError;
pub use event::{
    verify_events, AuditAction, AuditEvent, LedgerStatus, LedgerVerification, GENESIS,
};
