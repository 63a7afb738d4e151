//! Chain linking: resolving a capsule's claimed previous-hash against the
//! known receipt set.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use capseal_store::CapsuleRecord;

/// Outcome of a chain link check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    /// No previous hash claimed; this capsule starts a chain.
    Genesis,
    /// The claimed previous hash matches exactly one stored capsule.
    Linked,
    /// The claimed previous hash matches nothing, or capsule identity is
    /// ambiguous (a data-integrity alarm).
    Broken,
    /// The caller skipped chain verification. Distinct from Genesis and
    /// never a passing check.
    NotChecked,
}

impl ChainStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::Genesis => "GENESIS",
            ChainStatus::Linked => "LINKED",
            ChainStatus::Broken => "BROKEN",
            ChainStatus::NotChecked => "NOT_CHECKED",
        }
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full chain check result with link diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCheck {
    /// Whether the check was actually performed.
    pub checked: bool,
    pub status: ChainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Id of the matched predecessor capsule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_capsule_id: Option<String>,
    /// The matched predecessor's stored core hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_previous_hash: Option<String>,
    /// The hash the capsule claimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_previous_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_match: Option<bool>,
}

/// Resolves claimed previous-hashes against the stored capsule set.
pub struct ChainLinker<'a> {
    known: &'a [CapsuleRecord],
}

impl<'a> ChainLinker<'a> {
    /// Build a linker over the full known capsule set, in submission
    /// order. The order makes any match deterministic.
    pub fn new(known: &'a [CapsuleRecord]) -> Self {
        Self { known }
    }

    /// Resolve a claimed previous hash.
    ///
    /// - No claim → `Genesis`, no lookup performed.
    /// - Claim matching nothing → `Broken`.
    /// - Claim matching exactly one stored capsule → `Linked`.
    /// - Claim matching more than one stored capsule → `Broken` with a
    ///   duplicate-identity reason. Core hashes are capsule identity, so
    ///   duplicates mean the store itself is inconsistent; that is an
    ///   alarm, not something to resolve by picking a winner.
    pub fn link(&self, claimed_previous: Option<&str>) -> ChainCheck {
        let claimed = match claimed_previous {
            None => {
                return ChainCheck {
                    checked: true,
                    status: ChainStatus::Genesis,
                    reason: None,
                    previous_capsule_id: None,
                    expected_previous_hash: None,
                    observed_previous_hash: None,
                    link_match: None,
                };
            }
            Some(claimed) => claimed,
        };

        let matches: Vec<&CapsuleRecord> = self
            .known
            .iter()
            .filter(|record| record.core_hash == claimed)
            .collect();

        match matches.len() {
            0 => ChainCheck {
                checked: true,
                status: ChainStatus::Broken,
                reason: Some("claimed previous hash matches no stored capsule".to_string()),
                previous_capsule_id: None,
                expected_previous_hash: None,
                observed_previous_hash: Some(claimed.to_string()),
                link_match: Some(false),
            },
            1 => {
                let record = matches[0];
                ChainCheck {
                    checked: true,
                    status: ChainStatus::Linked,
                    reason: None,
                    previous_capsule_id: Some(record.capsule.capsule_id.clone()),
                    expected_previous_hash: Some(record.core_hash.clone()),
                    observed_previous_hash: Some(claimed.to_string()),
                    link_match: Some(true),
                }
            }
            n => {
                warn!(
                    claimed = %claimed,
                    count = n,
                    "duplicate capsule identity detected during chain link"
                );
                ChainCheck {
                    checked: true,
                    status: ChainStatus::Broken,
                    reason: Some(format!(
                        "{} stored capsules share the claimed previous hash; \
                         duplicate identities indicate a data-integrity fault",
                        n
                    )),
                    previous_capsule_id: None,
                    expected_previous_hash: None,
                    observed_previous_hash: Some(claimed.to_string()),
                    link_match: Some(false),
                }
            }
        }
    }

    /// The check the engine reports when caller policy skips chaining.
    pub fn skipped() -> ChainCheck {
        ChainCheck {
            checked: false,
            status: ChainStatus::NotChecked,
            reason: Some("chain verification skipped by caller".to_string()),
            previous_capsule_id: None,
            expected_previous_hash: None,
            observed_previous_hash: None,
            link_match: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capseal_core::{Capsule, CapsuleBuilder};

    fn record(seq: u64, capsule: Capsule) -> CapsuleRecord {
        let core_hash = capsule.core_hash().to_hex();
        CapsuleRecord {
            submission_seq: seq,
            capsule,
            core_hash,
            submitted_at: seq as i64,
        }
    }

    fn capsule(id: &str) -> Capsule {
        CapsuleBuilder::new(id, "demo-platform")
            .captured_at(1736870400000)
            .message("user", "hi")
            .build_unsigned()
    }

    #[test]
    fn test_no_claim_is_genesis() {
        let known = vec![record(1, capsule("c-1"))];
        let check = ChainLinker::new(&known).link(None);
        assert_eq!(check.status, ChainStatus::Genesis);
        assert!(check.checked);
        assert_eq!(check.link_match, None);
    }

    #[test]
    fn test_matching_claim_is_linked() {
        let first = capsule("c-1");
        let first_hash = first.core_hash().to_hex();
        let known = vec![record(1, first)];

        let check = ChainLinker::new(&known).link(Some(&first_hash));
        assert_eq!(check.status, ChainStatus::Linked);
        assert_eq!(check.link_match, Some(true));
        assert_eq!(check.previous_capsule_id.as_deref(), Some("c-1"));
        assert_eq!(check.expected_previous_hash.as_deref(), Some(first_hash.as_str()));
    }

    #[test]
    fn test_unknown_claim_is_broken() {
        let known = vec![record(1, capsule("c-1"))];
        let claimed = "00".repeat(32);
        let check = ChainLinker::new(&known).link(Some(&claimed));
        assert_eq!(check.status, ChainStatus::Broken);
        assert_eq!(check.link_match, Some(false));
        assert_eq!(check.observed_previous_hash.as_deref(), Some(claimed.as_str()));
    }

    #[test]
    fn test_duplicate_identity_is_an_alarm() {
        let first = capsule("c-1");
        let hash = first.core_hash().to_hex();
        // Forge a second record claiming the same core hash.
        let mut forged = record(2, capsule("c-2"));
        forged.core_hash = hash.clone();
        let known = vec![record(1, first), forged];

        let check = ChainLinker::new(&known).link(Some(&hash));
        assert_eq!(check.status, ChainStatus::Broken);
        assert!(check.reason.unwrap().contains("data-integrity"));
    }

    #[test]
    fn test_skipped_is_not_genesis() {
        let check = ChainLinker::skipped();
        assert_eq!(check.status, ChainStatus::NotChecked);
        assert!(!check.checked);
    }

    #[test]
    fn test_empty_store_with_claim_is_broken() {
        let known: Vec<CapsuleRecord> = Vec::new();
        let check = ChainLinker::new(&known).link(Some(&"ab".repeat(32)));
        assert_eq!(check.status, ChainStatus::Broken);
    }
}
