//! # capseal-registry
//!
//! Governed public-key registry for capsule signature verification.
//!
//! Keys are append-mostly: registration adds entries, and activate→revoke
//! is the only status transition. A revoked or expired key can never
//! produce a VALID signature result, and an issuer outside the trusted set
//! yields UNTRUSTED_ISSUER even when the cryptography checks out.

pub mod entry;
pub mod error;
pub mod registry;

pub use entry::{validity, InvalidityReason, KeyEntry, KeyStatus};
pub use error::RegistryError;
pub use registry::{KeyRegistry, SignatureCheck, SignatureStatus};
