//! Golden canonicalization vectors for cross-implementation verification.
//!
//! Every implementation of the capseal canonicalization must produce these
//! exact canonical strings and SHA-256 digests.

use capseal_core::{canonicalize, CapsuleCore, Message};

/// A single golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    pub name: &'static str,
    pub description: &'static str,
    /// (role, content) inputs.
    pub messages: &'static [(&'static str, &'static str)],
    /// Expected canonical string.
    pub canonical: &'static str,
    /// Expected SHA-256 hex digest of the canonical string.
    pub hash: &'static str,
}

/// All transcript canonicalization vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "single_message",
            description: "Minimal transcript: one short user message",
            messages: &[("user", "hi")],
            canonical: "4:user|2:hi\n",
            hash: "81de0d2aca8be959ffe331aa8b80030cf46aef37375748d78217e077a85bdfd7",
        },
        GoldenVector {
            name: "two_messages",
            description: "Role is lower-cased before hashing",
            messages: &[("User", "what is 2+2?"), ("assistant", "4")],
            canonical: "4:user|12:what is 2+2?\n9:assistant|1:4\n",
            hash: "59e19836bb2942b7d042cd3d80734c2211088af5aad4d9009097ecceb3f2b30d",
        },
        GoldenVector {
            name: "empty_content",
            description: "Empty content is length-prefixed, not dropped",
            messages: &[("system", "")],
            canonical: "6:system|0:\n",
            hash: "c5f2066ff1eadbd976377d4a6f103333520864db75a19e91cf0584beb10b78c5",
        },
        GoldenVector {
            name: "unicode_content",
            description: "Lengths are UTF-8 byte lengths, not char counts",
            messages: &[("user", "h\u{e9}llo \u{2713}")],
            canonical: "4:user|10:h\u{e9}llo \u{2713}\n",
            hash: "76549a359c906ec0908a5236e513f690eb7b7e7b56de6e5247a8744c8dac49c6",
        },
        GoldenVector {
            name: "structural_characters",
            description: "Separator characters in content cannot collide",
            messages: &[("user", "a|b"), ("user", "c")],
            canonical: "4:user|3:a|b\n4:user|1:c\n",
            hash: "c17f90c67d8782b9fa241f6682c533552d1afc3644e347ddf1ad5687c224807f",
        },
    ]
}

/// The golden capsule-core vector: a core with no optional fields.
pub fn core_vector() -> (CapsuleCore, &'static str) {
    let core = CapsuleCore {
        schema: "capseal.capsule/v1".to_string(),
        capsule_id: "c-1".to_string(),
        platform: "demo-platform".to_string(),
        captured_at: 1736870400000,
        transcript_hash: "59e19836bb2942b7d042cd3d80734c2211088af5aad4d9009097ecceb3f2b30d"
            .to_string(),
        canonicalization_version: "ctv1".to_string(),
        previous_hash: None,
        public_key_id: None,
    };
    (
        core,
        "9c5f711a6188b38a6fc45adde95eea73ce68bd8da60eab8694117db887af77af",
    )
}

/// Check every vector against the local implementation, returning the
/// names of any that fail.
pub fn verify_all_vectors() -> Vec<&'static str> {
    let mut failures = Vec::new();

    for vector in all_vectors() {
        let messages: Vec<Message> = vector
            .messages
            .iter()
            .map(|(role, content)| Message::new(*role, *content))
            .collect();
        let canonical = canonicalize(&messages);
        if canonical.canonical() != vector.canonical || canonical.hash().to_hex() != vector.hash {
            failures.push(vector.name);
        }
    }

    let (core, expected) = core_vector();
    if core.hash().to_hex() != expected {
        failures.push("capsule_core");
    }

    failures
}
