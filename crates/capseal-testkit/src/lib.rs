//! # capseal-testkit
//!
//! Testing utilities for capseal.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known canonicalization cases with expected
//!   canonical strings and digests, for cross-platform verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Golden Vectors
//!
//! ```rust
//! use capseal_testkit::vectors::verify_all_vectors;
//!
//! assert!(verify_all_vectors().is_empty());
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use capseal_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let capsule = fixture.signed_capsule("c-1");
//! assert!(capsule.signature.is_some());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    TestFixture, ACTIVE_KEY_ID, EXPIRED_KEY_ID, FIXTURE_CAPTURED_AT, FIXTURE_ISSUER,
    REVOKED_KEY_ID, UNTRUSTED_KEY_ID,
};
pub use generators::{arb_capsule, arb_message, arb_role, arb_transcript};
pub use vectors::{all_vectors, core_vector, verify_all_vectors, GoldenVector};
