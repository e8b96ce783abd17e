//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for result store operations
///
/// A cache miss is never represented here; lookups return `Ok(None)` instead.
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    /// I/O error on the backing file
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(memorun::cache::io),
        help("Check that the cache directory exists and is writable")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "remove", "create")
        operation: String,
    },

    /// The embedded database rejected an operation
    #[error("Cache database {operation} failed")]
    #[diagnostic(
        code(memorun::cache::database),
        help("The cache file may be locked by another process or corrupted")
    )]
    Database {
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
        /// Operation that failed (e.g., "open", "get", "put")
        operation: String,
    },

    /// Stored data could not be interpreted
    #[error("Cache is corrupt: {message}")]
    #[diagnostic(code(memorun::cache::corrupt))]
    Corrupt {
        /// Description of the inconsistency
        message: String,
    },

    /// A fingerprint string was malformed
    #[error("Invalid fingerprint: {message}")]
    #[diagnostic(
        code(memorun::cache::invalid_fingerprint),
        help("Fingerprints are 64 lowercase hexadecimal characters")
    )]
    InvalidFingerprint {
        /// What was wrong with the input
        message: String,
    },
}

impl StoreError {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a database error for the named operation
    #[must_use]
    pub fn database(source: rusqlite::Error, operation: impl Into<String>) -> Self {
        Self::Database {
            source,
            operation: operation.into(),
        }
    }

    /// Create a corruption error
    #[must_use]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt {
            message: msg.into(),
        }
    }

    /// Create an invalid fingerprint error
    #[must_use]
    pub fn invalid_fingerprint(msg: impl Into<String>) -> Self {
        Self::InvalidFingerprint {
            message: msg.into(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, StoreError>;
