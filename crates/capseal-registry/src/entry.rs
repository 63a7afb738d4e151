//! Key entries: governed public keys with status and validity windows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Governance status of a registered key. Activate-then-revoke is the only
/// status transition; revocation is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyStatus::Active => "ACTIVE",
            KeyStatus::Revoked => "REVOKED",
            KeyStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

/// A registered public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Registry identifier, referenced by capsule signature blocks.
    pub key_id: String,

    /// Hex-encoded Ed25519 public key material. Kept as submitted text and
    /// parsed at verification time, so malformed material degrades to an
    /// INVALID signature result instead of failing registration reads.
    pub public_key: String,

    /// Identifier of the issuing organization.
    pub issuer_id: String,

    /// Human-readable issuer label.
    pub issuer_label: String,

    /// Governance status.
    pub status: KeyStatus,

    /// Start of the validity window (Unix milliseconds).
    pub valid_from: i64,

    /// Optional end of the validity window (Unix milliseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<i64>,

    /// Reason recorded when the key was revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<String>,
}

impl KeyEntry {
    /// Create an active entry with an open-ended validity window.
    pub fn active(
        key_id: impl Into<String>,
        public_key: impl Into<String>,
        issuer_id: impl Into<String>,
        issuer_label: impl Into<String>,
        valid_from: i64,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            public_key: public_key.into(),
            issuer_id: issuer_id.into(),
            issuer_label: issuer_label.into(),
            status: KeyStatus::Active,
            valid_from,
            valid_to: None,
            revocation_reason: None,
        }
    }

    /// Bound the validity window.
    pub fn with_valid_to(mut self, valid_to: i64) -> Self {
        self.valid_to = Some(valid_to);
        self
    }
}

/// Why a resolved key cannot currently be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidityReason {
    /// Status is REVOKED; always invalid.
    Revoked,
    /// Status is EXPIRED; always invalid.
    Expired,
    /// The check time is before `valid_from`.
    NotYetValid,
    /// The check time is after `valid_to`.
    ValidityLapsed,
}

impl fmt::Display for InvalidityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvalidityReason::Revoked => "key is revoked",
            InvalidityReason::Expired => "key is expired",
            InvalidityReason::NotYetValid => "key is not yet valid",
            InvalidityReason::ValidityLapsed => "key validity window has lapsed",
        };
        write!(f, "{}", s)
    }
}

/// Check whether an entry is usable at the given time.
///
/// REVOKED and EXPIRED statuses are always invalid regardless of the
/// window; otherwise the time must fall inside `[valid_from, valid_to?]`.
pub fn validity(entry: &KeyEntry, at: i64) -> Result<(), InvalidityReason> {
    match entry.status {
        KeyStatus::Revoked => return Err(InvalidityReason::Revoked),
        KeyStatus::Expired => return Err(InvalidityReason::Expired),
        KeyStatus::Active => {}
    }

    if at < entry.valid_from {
        return Err(InvalidityReason::NotYetValid);
    }
    if let Some(valid_to) = entry.valid_to {
        if at > valid_to {
            return Err(InvalidityReason::ValidityLapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> KeyEntry {
        KeyEntry::active("key-1", "aa".repeat(32), "issuer-1", "Issuer One", 1000)
    }

    #[test]
    fn test_active_inside_window_is_valid() {
        assert!(validity(&entry(), 2000).is_ok());
    }

    #[test]
    fn test_revoked_always_invalid() {
        let mut e = entry();
        e.status = KeyStatus::Revoked;
        // Even at a time squarely inside the window.
        assert_eq!(validity(&e, 2000), Err(InvalidityReason::Revoked));
    }

    #[test]
    fn test_expired_always_invalid() {
        let mut e = entry();
        e.status = KeyStatus::Expired;
        assert_eq!(validity(&e, 2000), Err(InvalidityReason::Expired));
    }

    #[test]
    fn test_window_bounds() {
        let e = entry().with_valid_to(3000);
        assert_eq!(validity(&e, 999), Err(InvalidityReason::NotYetValid));
        assert!(validity(&e, 1000).is_ok());
        assert!(validity(&e, 3000).is_ok());
        assert_eq!(validity(&e, 3001), Err(InvalidityReason::ValidityLapsed));
    }
}
