//! Capsule schema validation: structural checks on submitted capsules.
//!
//! Malformed input is never repaired; it degrades to a `BAD_SCHEMA`
//! verification outcome at the engine layer.

use crate::capsule::{Capsule, CAPSULE_SCHEMA};
use crate::error::SchemaError;

/// Validate a capsule's structure.
///
/// This performs:
/// - Schema tag check
/// - Identifier and platform presence
/// - Transcript presence
/// - Timestamp plausibility
/// - Hash digest shape checks (declared transcript hash, previous hash)
///
/// Signature material is deliberately not validated here: malformed
/// signature bytes or key material degrade to an INVALID signature result
/// at the registry layer, not to a schema error.
pub fn validate_capsule(capsule: &Capsule) -> Result<(), SchemaError> {
    // 1. Schema tag
    if capsule.schema != CAPSULE_SCHEMA {
        return Err(SchemaError::UnsupportedSchema(capsule.schema.clone()));
    }

    // 2. Identity fields
    if capsule.capsule_id.is_empty() {
        return Err(SchemaError::EmptyCapsuleId);
    }
    if capsule.platform.is_empty() {
        return Err(SchemaError::EmptyPlatform);
    }

    // 3. Transcript presence
    if capsule.transcript.is_empty() {
        return Err(SchemaError::EmptyTranscript);
    }

    // 4. Timestamp
    if capsule.captured_at <= 0 {
        return Err(SchemaError::BadTimestamp(capsule.captured_at));
    }

    // 5. Declared transcript hash shape
    if !is_hex_digest(&capsule.transcript_hash) {
        return Err(SchemaError::MalformedTranscriptHash(
            capsule.transcript_hash.clone(),
        ));
    }

    // 6. Previous hash shape, if claimed
    if let Some(prev) = &capsule.previous_hash {
        if !is_hex_digest(prev) {
            return Err(SchemaError::MalformedPreviousHash(prev.clone()));
        }
    }

    Ok(())
}

/// A well-formed SHA-256 digest: exactly 64 lowercase hex characters.
fn is_hex_digest(s: &str) -> bool {
    s.len() == 64
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::CapsuleBuilder;

    fn valid_capsule() -> Capsule {
        CapsuleBuilder::new("c-1", "demo-platform")
            .captured_at(1736870400000)
            .message("user", "hi")
            .build_unsigned()
    }

    #[test]
    fn test_valid_capsule_passes() {
        assert!(validate_capsule(&valid_capsule()).is_ok());
    }

    #[test]
    fn test_unsupported_schema() {
        let mut capsule = valid_capsule();
        capsule.schema = "other/v9".to_string();
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn test_empty_capsule_id() {
        let mut capsule = valid_capsule();
        capsule.capsule_id = String::new();
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::EmptyCapsuleId)
        ));
    }

    #[test]
    fn test_empty_transcript() {
        let mut capsule = valid_capsule();
        capsule.transcript.clear();
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::EmptyTranscript)
        ));
    }

    #[test]
    fn test_bad_timestamp() {
        let mut capsule = valid_capsule();
        capsule.captured_at = 0;
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::BadTimestamp(0))
        ));
    }

    #[test]
    fn test_malformed_transcript_hash() {
        let mut capsule = valid_capsule();
        capsule.transcript_hash = "not-a-digest".to_string();
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::MalformedTranscriptHash(_))
        ));

        // Uppercase hex is rejected too: canonical digests are lowercase.
        let mut capsule = valid_capsule();
        capsule.transcript_hash = capsule.transcript_hash.to_uppercase();
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::MalformedTranscriptHash(_))
        ));
    }

    #[test]
    fn test_malformed_previous_hash() {
        let mut capsule = valid_capsule();
        capsule.previous_hash = Some("abc".to_string());
        assert!(matches!(
            validate_capsule(&capsule),
            Err(SchemaError::MalformedPreviousHash(_))
        ));
    }
}
