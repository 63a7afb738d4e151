//! Proptest strategies for property-based testing.

use proptest::prelude::*;

use capseal_core::{CapsuleBuilder, Capsule, Message};

/// Roles seen in the wild, in arbitrary casing.
pub fn arb_role() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("user".to_string()),
        Just("User".to_string()),
        Just("USER".to_string()),
        Just("assistant".to_string()),
        Just("Assistant".to_string()),
        Just("system".to_string()),
        Just("tool".to_string()),
    ]
}

/// Arbitrary message content, including separators and unicode.
pub fn arb_content() -> impl Strategy<Value = String> {
    ".{0,80}"
}

/// One transcript message.
pub fn arb_message() -> impl Strategy<Value = Message> {
    (arb_role(), arb_content()).prop_map(|(role, content)| Message { role, content })
}

/// A transcript of 1..=max messages.
pub fn arb_transcript(max: usize) -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(arb_message(), 1..=max)
}

/// An unsigned capsule with an honest transcript hash.
pub fn arb_capsule() -> impl Strategy<Value = Capsule> {
    ("c-[a-z0-9]{1,12}", arb_transcript(6), 1i64..=4102444800000i64).prop_map(
        |(capsule_id, messages, captured_at)| {
            let mut builder =
                CapsuleBuilder::new(capsule_id, "prop-platform").captured_at(captured_at);
            for message in messages {
                builder = builder.message(message.role, message.content);
            }
            builder.build_unsigned()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use capseal_core::{canonicalize, validate_capsule};

    proptest! {
        #[test]
        fn canonicalization_is_deterministic(messages in arb_transcript(8)) {
            let a = canonicalize(&messages);
            let b = canonicalize(&messages);
            prop_assert_eq!(a.canonical(), b.canonical());
            prop_assert_eq!(a.hash(), b.hash());
        }

        #[test]
        fn role_case_never_affects_hash(messages in arb_transcript(8)) {
            let upper: Vec<Message> = messages
                .iter()
                .map(|m| Message::new(m.role.to_uppercase(), m.content.clone()))
                .collect();
            prop_assert_eq!(
                canonicalize(&messages).hash(),
                canonicalize(&upper).hash()
            );
        }

        #[test]
        fn distinct_transcripts_get_distinct_hashes(
            messages in arb_transcript(4),
            extra in arb_message()
        ) {
            let mut longer = messages.clone();
            longer.push(extra);
            prop_assert_ne!(
                canonicalize(&messages).hash(),
                canonicalize(&longer).hash()
            );
        }

        #[test]
        fn generated_capsules_are_well_formed(capsule in arb_capsule()) {
            prop_assert!(validate_capsule(&capsule).is_ok());
            // The builder's declared hash is honest.
            prop_assert_eq!(
                canonicalize(&capsule.transcript).hash().to_hex(),
                capsule.transcript_hash.clone()
            );
        }

        #[test]
        fn core_hash_is_stable_identity(capsule in arb_capsule()) {
            prop_assert_eq!(capsule.core_hash(), capsule.core_hash());
        }
    }
}
