//! The key registry: governed key store plus the signature check.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use capseal_core::{Ed25519PublicKey, Ed25519Signature, SignatureBlock, SIGNATURE_ALGORITHM};

use crate::entry::{validity, KeyEntry, KeyStatus};
use crate::error::RegistryError;

/// Outcome of checking a capsule signature against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
    /// Key resolved, currently valid, issuer trusted, crypto passed.
    Valid,
    /// The cryptographic check failed or could not be attempted
    /// (malformed signature bytes, malformed key material).
    Invalid,
    /// The key is unknown, not currently valid, or its issuer is not
    /// trusted. Subsumes key-not-found and key-invalid.
    UntrustedIssuer,
    /// The capsule carries no signature block.
    NoSignature,
}

/// Full signature check result with issuer diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCheck {
    pub status: SignatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_status: Option<KeyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted: Option<bool>,
}

impl SignatureCheck {
    fn bare(status: SignatureStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
            issuer_id: None,
            issuer_label: None,
            key_status: None,
            trusted: None,
        }
    }

    fn for_entry(
        status: SignatureStatus,
        reason: Option<String>,
        entry: &KeyEntry,
        trusted: bool,
    ) -> Self {
        Self {
            status,
            reason,
            issuer_id: Some(entry.issuer_id.clone()),
            issuer_label: Some(entry.issuer_label.clone()),
            key_status: Some(entry.status),
            trusted: Some(trusted),
        }
    }
}

struct RegistryInner {
    keys: HashMap<String, KeyEntry>,
    trusted_issuers: HashSet<String>,
}

/// Governed store of public keys and trusted issuers.
///
/// Mutations take the write lock, so a concurrent verify observes either
/// the pre- or post-mutation state, never a partially updated entry.
pub struct KeyRegistry {
    inner: RwLock<RegistryInner>,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                keys: HashMap::new(),
                trusted_issuers: HashSet::new(),
            }),
        }
    }

    /// Register a new key. Key ids are append-only: re-registering an
    /// existing id is rejected rather than silently replacing material.
    pub fn add_key(&self, entry: KeyEntry) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        if inner.keys.contains_key(&entry.key_id) {
            return Err(RegistryError::DuplicateKey(entry.key_id));
        }
        info!(key_id = %entry.key_id, issuer = %entry.issuer_id, "key registered");
        inner.keys.insert(entry.key_id.clone(), entry);
        Ok(())
    }

    /// Revoke a key. Permanent; the only status mutation besides expiry.
    pub fn revoke_key(
        &self,
        key_id: &str,
        reason: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .keys
            .get_mut(key_id)
            .ok_or_else(|| RegistryError::KeyNotFound(key_id.to_string()))?;
        entry.status = KeyStatus::Revoked;
        entry.revocation_reason = Some(reason.into());
        info!(key_id = %key_id, "key revoked");
        Ok(())
    }

    /// Mark a key expired.
    pub fn expire_key(&self, key_id: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .keys
            .get_mut(key_id)
            .ok_or_else(|| RegistryError::KeyNotFound(key_id.to_string()))?;
        entry.status = KeyStatus::Expired;
        info!(key_id = %key_id, "key expired");
        Ok(())
    }

    /// Remove a key entirely.
    pub fn remove_key(&self, key_id: &str) -> Result<KeyEntry, RegistryError> {
        let mut inner = self.inner.write().unwrap();
        inner
            .keys
            .remove(key_id)
            .ok_or_else(|| RegistryError::KeyNotFound(key_id.to_string()))
    }

    /// Add an issuer to the trusted set.
    pub fn trust_issuer(&self, issuer_id: impl Into<String>) {
        let issuer_id = issuer_id.into();
        let mut inner = self.inner.write().unwrap();
        info!(issuer = %issuer_id, "issuer trusted");
        inner.trusted_issuers.insert(issuer_id);
    }

    /// Check whether an issuer is trusted.
    pub fn is_trusted(&self, issuer_id: &str) -> bool {
        self.inner.read().unwrap().trusted_issuers.contains(issuer_id)
    }

    /// Look up a key entry by id.
    pub fn resolve(&self, key_id: &str) -> Option<KeyEntry> {
        self.inner.read().unwrap().keys.get(key_id).cloned()
    }

    /// List all registered keys.
    pub fn list_keys(&self) -> Vec<KeyEntry> {
        let inner = self.inner.read().unwrap();
        let mut keys: Vec<KeyEntry> = inner.keys.values().cloned().collect();
        keys.sort_by(|a, b| a.key_id.cmp(&b.key_id));
        keys
    }

    /// Check a signature over `message` at time `at`.
    ///
    /// Decision order:
    /// 1. no signature block → NoSignature
    /// 2. key id unknown → UntrustedIssuer ("key not found")
    /// 3. key not currently valid → UntrustedIssuer, never silently valid
    /// 4. issuer not trusted → UntrustedIssuer even if the crypto would pass
    /// 5. malformed key material / signature bytes → Invalid
    /// 6. cryptographic verification → Valid or Invalid
    ///
    /// Cryptographic failures are caught and reported as data; this method
    /// never panics and never returns an error.
    pub fn verify(
        &self,
        message: &[u8],
        signature: Option<&SignatureBlock>,
        at: i64,
    ) -> SignatureCheck {
        let block = match signature {
            Some(block) => block,
            None => {
                return SignatureCheck::bare(
                    SignatureStatus::NoSignature,
                    "no signature block present",
                );
            }
        };

        // One read guard for the whole lookup: a verify in flight sees
        // either the pre- or post-mutation registry, never a mix.
        let (entry, trusted) = {
            let inner = self.inner.read().unwrap();
            match inner.keys.get(&block.public_key_id) {
                Some(entry) => {
                    let trusted = inner.trusted_issuers.contains(&entry.issuer_id);
                    (entry.clone(), trusted)
                }
                None => {
                    debug!(key_id = %block.public_key_id, "signature key not found");
                    return SignatureCheck::bare(
                        SignatureStatus::UntrustedIssuer,
                        format!("key not found: {}", block.public_key_id),
                    );
                }
            }
        };

        if let Err(reason) = validity(&entry, at) {
            return SignatureCheck::for_entry(
                SignatureStatus::UntrustedIssuer,
                Some(reason.to_string()),
                &entry,
                trusted,
            );
        }

        if !trusted {
            return SignatureCheck::for_entry(
                SignatureStatus::UntrustedIssuer,
                Some(format!("issuer not trusted: {}", entry.issuer_id)),
                &entry,
                false,
            );
        }

        if block.algorithm != SIGNATURE_ALGORITHM {
            return SignatureCheck::for_entry(
                SignatureStatus::Invalid,
                Some(format!("unsupported signature algorithm: {}", block.algorithm)),
                &entry,
                true,
            );
        }

        let public_key = match Ed25519PublicKey::from_hex(&entry.public_key) {
            Ok(pk) => pk,
            Err(_) => {
                return SignatureCheck::for_entry(
                    SignatureStatus::Invalid,
                    Some("malformed public key material".to_string()),
                    &entry,
                    true,
                );
            }
        };

        let sig = match Ed25519Signature::from_hex(&block.value) {
            Ok(sig) => sig,
            Err(_) => {
                return SignatureCheck::for_entry(
                    SignatureStatus::Invalid,
                    Some("malformed signature bytes".to_string()),
                    &entry,
                    true,
                );
            }
        };

        match public_key.verify(message, &sig) {
            Ok(()) => SignatureCheck::for_entry(SignatureStatus::Valid, None, &entry, true),
            Err(_) => SignatureCheck::for_entry(
                SignatureStatus::Invalid,
                Some("signature verification failed".to_string()),
                &entry,
                true,
            ),
        }
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
