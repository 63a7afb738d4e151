//! # capseal-store
//!
//! Storage abstraction for capseal.
//!
//! The [`Store`] trait hides the persistence backend from the verification
//! core so a persistent engine can be substituted without touching any
//! verification logic. Two implementations ship here:
//!
//! - [`SqliteStore`] - the primary backend (rusqlite, bundled SQLite)
//! - [`MemoryStore`] - in-memory, for tests

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CapsuleRecord, InsertOutcome, Store};
