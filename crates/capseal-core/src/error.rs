//! Error types for capseal-core.

use thiserror::Error;

/// Core errors that can occur during capsule operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("unsupported canonicalization version: {0}")]
    UnsupportedCanonicalization(String),

    #[error("malformed capsule: {0}")]
    MalformedCapsule(String),
}

/// Structural schema violations found in a submitted capsule.
///
/// These are reported as data (a `BAD_SCHEMA` failure mode), never thrown
/// past the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unsupported schema tag: {0}")]
    UnsupportedSchema(String),

    #[error("capsule id must not be empty")]
    EmptyCapsuleId,

    #[error("platform label must not be empty")]
    EmptyPlatform,

    #[error("transcript must contain at least one message")]
    EmptyTranscript,

    #[error("captured_at must be a positive Unix-millisecond timestamp, got {0}")]
    BadTimestamp(i64),

    #[error("declared transcript hash is not a 64-char lowercase hex digest: {0}")]
    MalformedTranscriptHash(String),

    #[error("previous hash is not a 64-char lowercase hex digest: {0}")]
    MalformedPreviousHash(String),
}
