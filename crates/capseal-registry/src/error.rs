//! Error types for the key registry.

use thiserror::Error;

/// Errors from registry administration.
///
/// Signature verification itself never errors; its outcomes are data
/// (`SignatureCheck`).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("key already registered: {0}")]
    DuplicateKey(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),
}
