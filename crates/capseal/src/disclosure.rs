//! Disclosure policy: proof packs and mode-gated transcript views.
//!
//! The proof pack carries only integrity/signature/chain/audit-head
//! summaries. Raw transcript content never enters it, whatever the
//! configured transcript mode.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use capseal_core::{Capsule, Message};
use capseal_ledger::AuditEvent;
use capseal_registry::SignatureStatus;

use crate::chain::ChainStatus;
use crate::engine::{FailureMode, VerificationResult, VerificationStatus};

/// What a proof pack attests to.
pub const PROOF_SCOPE: [&str; 3] = ["integrity", "signature", "chain"];

/// What a proof pack explicitly does not attest to, so callers cannot
/// mistake integrity proof for content judgment.
pub const PROOF_SCOPE_EXCLUDES: [&str; 3] = ["truth", "completeness", "authorship_intent"];

/// Configured disclosure level for transcript content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptMode {
    /// Messages pass through unchanged.
    Full,
    /// PII-shaped substrings are scrubbed from message content.
    Redacted,
    /// Message content is omitted entirely; only the count is reported.
    Hidden,
}

impl fmt::Display for TranscriptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TranscriptMode::Full => "full",
            TranscriptMode::Redacted => "redacted",
            TranscriptMode::Hidden => "hidden",
        };
        write!(f, "{}", s)
    }
}

/// Integrity summary disclosed in a proof pack. Digests only; digests are
/// content-addressed but content-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegritySummary {
    pub hash_match: bool,
    pub transcript_hash: String,
}

/// Signature summary disclosed in a proof pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub status: SignatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_label: Option<String>,
}

/// Chain summary disclosed in a proof pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub status: ChainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_match: Option<bool>,
}

/// Head of the audit ledger at proof time, anchoring the pack to the
/// tamper-evident history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditHead {
    pub seq: u64,
    pub event_hash: String,
}

/// The minimal, content-free disclosure of a verification outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofPack {
    pub capsule_id: String,
    pub proof_scope: Vec<String>,
    pub proof_scope_excludes: Vec<String>,
    pub status: VerificationStatus,
    pub failure_modes: Vec<FailureMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegritySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_head: Option<AuditHead>,
}

/// A transcript view gated by the configured mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TranscriptView {
    Full { messages: Vec<Message> },
    Redacted { messages: Vec<Message> },
    Hidden { message_count: usize },
}

/// Derives proof packs and transcript views.
///
/// The two outputs are independent: changing the transcript mode changes
/// only the transcript view, never what the proof pack contains.
#[derive(Debug, Clone, Copy)]
pub struct DisclosurePolicy {
    mode: TranscriptMode,
}

impl DisclosurePolicy {
    pub fn new(mode: TranscriptMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TranscriptMode {
        self.mode
    }

    /// Build the content-free proof pack for a verification result.
    pub fn proof_pack(
        &self,
        result: &VerificationResult,
        audit_head: Option<&AuditEvent>,
    ) -> ProofPack {
        ProofPack {
            capsule_id: result.capsule_id.clone(),
            proof_scope: PROOF_SCOPE.iter().map(|s| s.to_string()).collect(),
            proof_scope_excludes: PROOF_SCOPE_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            status: result.status,
            failure_modes: result.failure_modes.clone(),
            integrity: result.integrity.as_ref().map(|i| IntegritySummary {
                hash_match: i.hash_match,
                transcript_hash: i.declared_hash.clone(),
            }),
            signature: result.signature.as_ref().map(|s| SignatureSummary {
                status: s.status,
                issuer_label: s.issuer_label.clone(),
            }),
            chain: result.chain.as_ref().map(|c| ChainSummary {
                status: c.status,
                link_match: c.link_match,
            }),
            audit_head: audit_head.map(|event| AuditHead {
                seq: event.seq,
                event_hash: event.compute_hash().to_hex(),
            }),
        }
    }

    /// Build the mode-gated transcript view for a capsule.
    pub fn transcript_view(&self, capsule: &Capsule) -> TranscriptView {
        match self.mode {
            TranscriptMode::Full => TranscriptView::Full {
                messages: capsule.transcript.clone(),
            },
            TranscriptMode::Redacted => TranscriptView::Redacted {
                messages: capsule
                    .transcript
                    .iter()
                    .map(|m| Message {
                        role: m.role.clone(),
                        content: redact(&m.content),
                    })
                    .collect(),
            },
            TranscriptMode::Hidden => TranscriptView::Hidden {
                message_count: capsule.transcript.len(),
            },
        }
    }
}

/// Scrub PII-shaped substrings from message content.
///
/// Patterns: email addresses, SSN-shaped, phone-shaped and IPv4-shaped
/// substrings. Pattern-based only; this is a disclosure reduction, not a
/// guarantee of anonymity.
pub fn redact(content: &str) -> String {
    let mut out = content.to_string();
    for (pattern, replacement) in patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

fn patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (
                Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                    .expect("email pattern"),
                "[email redacted]",
            ),
            (
                Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern"),
                "[ssn redacted]",
            ),
            (
                Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b")
                    .expect("phone pattern"),
                "[phone redacted]",
            ),
            (
                Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 pattern"),
                "[ip redacted]",
            ),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use capseal_core::CapsuleBuilder;
    use crate::engine::IntegrityCheck;

    fn capsule_with_pii() -> Capsule {
        CapsuleBuilder::new("c-1", "demo-platform")
            .captured_at(1736870400000)
            .message("user", "mail me at jane.doe@example.com or call 555-867-5309")
            .message("assistant", "noted; your server is 192.168.1.10 and ssn 123-45-6789")
            .build_unsigned()
    }

    fn result_for(capsule: &Capsule) -> VerificationResult {
        VerificationResult {
            request_id: None,
            capsule_id: capsule.capsule_id.clone(),
            status: VerificationStatus::Verified,
            failure_modes: vec![],
            integrity: Some(IntegrityCheck {
                hash_match: true,
                computed_hash: capsule.transcript_hash.clone(),
                declared_hash: capsule.transcript_hash.clone(),
            }),
            signature: None,
            chain: None,
            canonicalization: None,
            schema_error: None,
            verified_at: 1736870400000,
        }
    }

    #[test]
    fn test_full_mode_passthrough() {
        let capsule = capsule_with_pii();
        let view = DisclosurePolicy::new(TranscriptMode::Full).transcript_view(&capsule);
        match view {
            TranscriptView::Full { messages } => {
                assert_eq!(messages, capsule.transcript);
            }
            _ => panic!("expected full view"),
        }
    }

    #[test]
    fn test_redacted_mode_scrubs_pii() {
        let capsule = capsule_with_pii();
        let view = DisclosurePolicy::new(TranscriptMode::Redacted).transcript_view(&capsule);
        let messages = match view {
            TranscriptView::Redacted { messages } => messages,
            _ => panic!("expected redacted view"),
        };

        // Count and role sequence preserved.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");

        let joined = format!("{} {}", messages[0].content, messages[1].content);
        assert!(!joined.contains("jane.doe@example.com"));
        assert!(!joined.contains("555-867-5309"));
        assert!(!joined.contains("192.168.1.10"));
        assert!(!joined.contains("123-45-6789"));
        assert!(joined.contains("[email redacted]"));
        assert!(joined.contains("[phone redacted]"));
        assert!(joined.contains("[ip redacted]"));
        assert!(joined.contains("[ssn redacted]"));
    }

    #[test]
    fn test_hidden_mode_reports_count_only() {
        let capsule = capsule_with_pii();
        let view = DisclosurePolicy::new(TranscriptMode::Hidden).transcript_view(&capsule);
        assert_eq!(view, TranscriptView::Hidden { message_count: 2 });
    }

    #[test]
    fn test_proof_pack_contains_no_content_in_any_mode() {
        let capsule = capsule_with_pii();
        let result = result_for(&capsule);

        for mode in [
            TranscriptMode::Full,
            TranscriptMode::Redacted,
            TranscriptMode::Hidden,
        ] {
            let pack = DisclosurePolicy::new(mode).proof_pack(&result, None);
            let json = serde_json::to_string(&pack).unwrap();
            assert!(!json.contains("jane.doe@example.com"), "mode {mode}");
            assert!(!json.contains("mail me"), "mode {mode}");
            assert!(!json.contains("555-867-5309"), "mode {mode}");
        }
    }

    #[test]
    fn test_proof_pack_declares_scope() {
        let capsule = capsule_with_pii();
        let pack =
            DisclosurePolicy::new(TranscriptMode::Hidden).proof_pack(&result_for(&capsule), None);
        assert_eq!(pack.proof_scope, vec!["integrity", "signature", "chain"]);
        assert_eq!(
            pack.proof_scope_excludes,
            vec!["truth", "completeness", "authorship_intent"]
        );
    }

    #[test]
    fn test_redact_leaves_ordinary_text_alone() {
        let text = "the answer is 4, see section 1.2 for details";
        assert_eq!(redact(text), text);
    }
}
