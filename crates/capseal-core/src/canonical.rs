//! Deterministic transcript canonicalization.
//!
//! A transcript is canonicalized into one exact byte string before hashing.
//! Only `role` and `content` participate; role is lower-cased, content is
//! taken verbatim. Field values are length-prefixed so the encoding is
//! unambiguous: the same (role, content) sequence always produces identical
//! bytes, and no two different sequences can collide on the string level.
//!
//! The canonical encoding is critical: it ensures that the same transcript
//! produces identical bytes (and thus identical hashes) across all platforms.

use crate::capsule::Message;
use crate::crypto::Sha256Hash;
use crate::error::CoreError;

/// The canonicalization version implemented by this crate.
pub const CANONICAL_VERSION: &str = "ctv1";

/// The message fields that participate in hashing.
pub const HASHED_FIELDS: [&str; 2] = ["role", "content"];

/// Check whether a declared canonicalization version tag is supported.
pub fn is_supported_version(tag: &str) -> bool {
    tag == CANONICAL_VERSION
}

/// The canonical form of a transcript plus fixed metadata about how it
/// was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTranscript {
    /// Version tag of the canonicalization scheme.
    pub version: &'static str,
    /// Which message fields were hashed.
    pub fields: [&'static str; 2],
    /// Number of messages in the transcript.
    pub message_count: usize,
    /// Byte length of the canonical form.
    pub byte_len: usize,
    canonical: String,
}

impl CanonicalTranscript {
    /// The canonical string itself.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// SHA-256 over the UTF-8 bytes of the canonical string.
    pub fn hash(&self) -> Sha256Hash {
        Sha256Hash::hash(self.canonical.as_bytes())
    }
}

/// Canonicalize a transcript under the current version.
///
/// Per message: `<role_len>:<role_lower>|<content_len>:<content>` followed
/// by a newline. Lengths are byte lengths of the encoded value, so values
/// containing `|`, `:` or newlines cannot be confused with structure.
pub fn canonicalize(messages: &[Message]) -> CanonicalTranscript {
    let mut canonical = String::new();
    for message in messages {
        let role = message.role.to_lowercase();
        push_field(&mut canonical, &role);
        canonical.push('|');
        push_field(&mut canonical, &message.content);
        canonical.push('\n');
    }

    CanonicalTranscript {
        version: CANONICAL_VERSION,
        fields: HASHED_FIELDS,
        message_count: messages.len(),
        byte_len: canonical.len(),
        canonical,
    }
}

/// Canonicalize a transcript whose capsule declares a version tag.
///
/// An unsupported tag aborts before any hashing work: verification must
/// fail closed rather than guess at a different scheme's byte layout.
pub fn canonicalize_versioned(
    tag: &str,
    messages: &[Message],
) -> Result<CanonicalTranscript, CoreError> {
    if !is_supported_version(tag) {
        return Err(CoreError::UnsupportedCanonicalization(tag.to_string()));
    }
    Ok(canonicalize(messages))
}

/// Length-prefix a field value: `<byte_len>:<value>`.
fn push_field(buf: &mut String, value: &str) {
    buf.push_str(&value.len().to_string());
    buf.push(':');
    buf.push_str(value);
}

/// Serialize a flat set of named fields as key-sorted `key=<len>:<value>`
/// lines.
///
/// This is the hash input format shared by capsule cores, audit events and
/// checkpoint payloads. Absent optional fields must simply not appear in
/// `fields`; the encoding never null-pads.
pub fn canonical_kv(fields: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (key, value) in sorted {
        out.push_str(key);
        out.push('=');
        push_field(&mut out, value);
        out.push('\n');
    }
    out
}
