//! Error types for the capseal facade.
//!
//! Verification outcomes are never errors: the engine's public contract is
//! "always returns a result" so every verification attempt is auditable.
//! Errors here are persistence faults and administrative misuse.

use thiserror::Error;

use capseal_core::SchemaError;
use capseal_ledger::LedgerError;
use capseal_registry::RegistryError;
use capseal_store::StoreError;

/// Errors that can occur during Verifier operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Storage error. Fatal to the specific request: a silently dropped
    /// audit write would corrupt the tamper-evidence guarantee.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Registry administration error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Checkpoint signer misuse.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Submission of a structurally malformed capsule.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Capsule not found in the store.
    #[error("capsule not found: {0}")]
    CapsuleNotFound(String),

    /// Audit verification range is outside the ledger.
    #[error("invalid audit range: {from}..={to}")]
    InvalidRange { from: u64, to: u64 },
}

/// Result type for Verifier operations.
pub type Result<T> = std::result::Result<T, KernelError>;
