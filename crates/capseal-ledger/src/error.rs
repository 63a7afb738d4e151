//! Error types for the ledger crate.

use thiserror::Error;

/// Errors from checkpoint signer construction.
///
/// Ledger and checkpoint verification never error; their outcomes are data
/// (`LedgerVerification`, `CheckpointChainVerification`).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ephemeral signer requires explicit opt-in via CheckpointSigner::ephemeral()")]
    EphemeralRequiresOptIn,
}
