//! Content-addressed snippet result cache for memorun
//!
//! This crate provides the memoization layer behind snippet execution:
//! - Deterministic fingerprints of snippet source (SHA-256)
//! - Invocation keys that fold the toolchain configuration into the digest
//! - A process-lifetime result store backed by SQLite
//!
//! # Overview
//!
//! Only successful runs are stored. A row maps a fingerprint to the standard
//! output the snippet produced; the row is replaced if the same fingerprint is
//! written again and disappears together with the store file on close.

mod error;
pub mod fingerprint;
pub mod store;

// Re-export error types at crate root
pub use error::{Result, StoreError};

// Re-export main types
pub use fingerprint::{Fingerprint, KeyEnvelope, fingerprint};
pub use store::ResultStore;
