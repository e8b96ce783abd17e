//! Error types for memorun-core
//!
//! Only environment problems are errors here. A snippet that fails to compile
//! or exits non-zero is reported through [`crate::Outcome`] instead.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::toolchain::ProcessError;
use crate::workspace::WorkspaceError;
use memorun_cache::StoreError;
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for memorun operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The result store is unavailable or corrupt
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    /// Temporary snippet files could not be created or removed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(memorun::config::invalid))]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {}", path.display())]
    #[diagnostic(code(memorun::config::io))]
    ConfigRead {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path of the configuration file
        path: Box<Path>,
    },

    /// Configuration file is not valid TOML for the expected schema
    #[error("Failed to parse configuration file {}: {message}", path.display())]
    #[diagnostic(
        code(memorun::config::parse),
        help("Keys are camelCase, e.g. `compileTimeoutMs` or `[rust] optLevel`")
    )]
    ConfigParse {
        /// Path of the configuration file
        path: Box<Path>,
        /// Parser message
        message: String,
    },

    /// A toolchain process could not be started or waited on
    #[error(transparent)]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a configuration read error
    #[must_use]
    pub fn config_read(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::ConfigRead {
            source,
            path: path.as_ref().into(),
        }
    }

    /// Create a configuration parse error
    #[must_use]
    pub fn config_parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.as_ref().into(),
            message: message.into(),
        }
    }
}

/// Result type for memorun operations
pub type Result<T> = std::result::Result<T, Error>;
