//! The verification decision engine.
//!
//! Combines the integrity, signature and chain checks into one verdict
//! plus an ordered list of failure modes. The decision table is evaluated
//! in a fixed precedence so outcomes are reproducible.

use serde::{Deserialize, Serialize};
use std::fmt;

use capseal_core::Capsule;
use capseal_registry::{SignatureCheck, SignatureStatus};

use crate::chain::{ChainCheck, ChainStatus};

/// The overall verdict of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// Hash matches, signature valid from a trusted key, chain did not
    /// fail.
    Verified,
    /// Hash matches and the chain did not fail, but the signature is
    /// missing or its issuer cannot be trusted.
    PartiallyVerified,
    /// At least one check failed, or a check was explicitly bypassed.
    Unverified,
}

impl VerificationStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::PartiallyVerified => "PARTIALLY_VERIFIED",
            VerificationStatus::Unverified => "UNVERIFIED",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure-mode codes reported alongside a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureMode {
    /// The request was structurally malformed.
    BadSchema,
    /// The capsule declared an unsupported canonicalization version;
    /// verification aborted before any hashing.
    UnknownCanonicalization,
    /// Computed transcript hash differs from the declared hash.
    HashMismatch,
    /// The signature failed cryptographic verification.
    BadSignature,
    /// The claimed previous hash resolves to nothing (or to an ambiguous
    /// identity).
    ChainBroken,
    /// The caller explicitly bypassed signature verification.
    SignatureNotVerified,
    /// The signing key is unknown, invalid, or from an untrusted issuer.
    UntrustedIssuer,
    /// The capsule carries no signature.
    NoSignature,
}

impl FailureMode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::BadSchema => "BAD_SCHEMA",
            FailureMode::UnknownCanonicalization => "UNKNOWN_CANONICALIZATION",
            FailureMode::HashMismatch => "HASH_MISMATCH",
            FailureMode::BadSignature => "BAD_SIGNATURE",
            FailureMode::ChainBroken => "CHAIN_BROKEN",
            FailureMode::SignatureNotVerified => "SIGNATURE_NOT_VERIFIED",
            FailureMode::UntrustedIssuer => "UNTRUSTED_ISSUER",
            FailureMode::NoSignature => "NO_SIGNATURE",
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller options for a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOptions {
    /// When false, signature verification is bypassed. A bypassed
    /// verification can never come out VERIFIED or PARTIALLY_VERIFIED.
    pub verify_signature: bool,
    /// When false, the chain check is skipped (NOT_CHECKED, which still
    /// allows VERIFIED when the signature is valid).
    pub verify_chain: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            verify_signature: true,
            verify_chain: true,
        }
    }
}

/// A verification request as received from the external interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub capsule: Capsule,
    #[serde(default)]
    pub options: VerifyOptions,
}

impl VerifyRequest {
    /// A request with default options.
    pub fn new(capsule: Capsule) -> Self {
        Self {
            request_id: None,
            capsule,
            options: VerifyOptions::default(),
        }
    }
}

/// Integrity sub-result: declared vs computed transcript hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityCheck {
    pub hash_match: bool,
    pub computed_hash: String,
    pub declared_hash: String,
}

/// Canonicalization metadata echoed back for reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalizationInfo {
    pub version: String,
    pub fields: Vec<String>,
    pub message_count: usize,
    pub byte_len: usize,
}

/// The immutable record produced by one verification.
///
/// Sub-results are `None` when a gate short-circuited before they could be
/// computed (bad schema, unknown canonicalization, bypassed signature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub capsule_id: String,
    pub status: VerificationStatus,
    pub failure_modes: Vec<FailureMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonicalization: Option<CanonicalizationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<String>,
    pub verified_at: i64,
}

impl VerificationResult {
    /// Whether this verdict unlocks downstream use (interpretation,
    /// observation features). The kill switch can still override this.
    pub fn unlocks_downstream(&self) -> bool {
        self.status != VerificationStatus::Unverified
    }
}

/// The decision table of the engine, evaluated in exact precedence:
///
/// 1. hash mismatch → UNVERIFIED (+HASH_MISMATCH)
/// 2. signature INVALID → UNVERIFIED (+BAD_SIGNATURE)
/// 3. chain BROKEN → UNVERIFIED (+CHAIN_BROKEN)
/// 4. bypass requested → UNVERIFIED (+SIGNATURE_NOT_VERIFIED)
/// 5. signature VALID and chain in {LINKED, GENESIS, NOT_CHECKED} → VERIFIED
/// 6. otherwise → PARTIALLY_VERIFIED (+UNTRUSTED_ISSUER or +NO_SIGNATURE)
///
/// Failure modes accumulate in precedence order, so a capsule failing
/// several checks reports all of them.
pub fn decide(
    hash_match: bool,
    signature: Option<SignatureStatus>,
    chain: ChainStatus,
    bypass: bool,
) -> (VerificationStatus, Vec<FailureMode>) {
    let mut failure_modes = Vec::new();

    if !hash_match {
        failure_modes.push(FailureMode::HashMismatch);
    }
    if signature == Some(SignatureStatus::Invalid) {
        failure_modes.push(FailureMode::BadSignature);
    }
    if chain == ChainStatus::Broken {
        failure_modes.push(FailureMode::ChainBroken);
    }
    if bypass {
        failure_modes.push(FailureMode::SignatureNotVerified);
    }
    if !failure_modes.is_empty() {
        return (VerificationStatus::Unverified, failure_modes);
    }

    // Reaching here: the hash matches, the chain is LINKED, GENESIS or
    // NOT_CHECKED, no bypass was requested and the signature is not
    // INVALID. An absent check result is classified as NO_SIGNATURE.
    match signature.unwrap_or(SignatureStatus::NoSignature) {
        SignatureStatus::Valid => (VerificationStatus::Verified, failure_modes),
        SignatureStatus::UntrustedIssuer => {
            failure_modes.push(FailureMode::UntrustedIssuer);
            (VerificationStatus::PartiallyVerified, failure_modes)
        }
        SignatureStatus::NoSignature => {
            failure_modes.push(FailureMode::NoSignature);
            (VerificationStatus::PartiallyVerified, failure_modes)
        }
        // Handled by the precedence pass; kept for totality.
        SignatureStatus::Invalid => (
            VerificationStatus::Unverified,
            vec![FailureMode::BadSignature],
        ),
    }
}
