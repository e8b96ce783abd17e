//! Ephemeral per-invocation snippet workspaces
//!
//! A [`Workspace`] is a uniquely named directory holding the source file
//! written for one snippet run and, for compiled languages, the artifact the
//! compiler writes. Anything else a toolchain leaves in there (codegen
//! objects, scratch directories of a killed compiler) goes with it:
//! [`Workspace::release`] removes the whole directory, and a workspace dropped
//! without release removes it on drop, so no exit path leaves files behind.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::LanguageKind;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Name prefix shared by all workspace directories
pub const WORKSPACE_PREFIX: &str = "memorun-";

/// File stem of the source and artifact inside a workspace
const SNIPPET_STEM: &str = "main";

/// Failure to create or remove workspace files
#[derive(Error, Debug, Diagnostic)]
pub enum WorkspaceError {
    /// A workspace directory or file could not be created or written
    #[error("Failed to create workspace file {}", path.display())]
    #[diagnostic(
        code(memorun::workspace::create),
        help("Check that the workspace directory exists and is writable")
    )]
    Create {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path being created
        path: Box<Path>,
    },

    /// A workspace directory exists but could not be removed
    #[error("Failed to remove workspace {}", path.display())]
    #[diagnostic(code(memorun::workspace::remove))]
    Remove {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path being removed
        path: Box<Path>,
    },
}

impl WorkspaceError {
    fn create(source: std::io::Error, path: &Path) -> Self {
        Self::Create {
            source,
            path: path.into(),
        }
    }

    fn remove(source: std::io::Error, path: &Path) -> Self {
        Self::Remove {
            source,
            path: path.into(),
        }
    }
}

/// Allocates uniquely named workspaces under a root directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create a manager placing workspaces in `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the workspaces
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh workspace directory, write `source` into it and
    /// reserve an artifact path next to it
    pub fn acquire(
        &self,
        source: &[u8],
        language: LanguageKind,
    ) -> Result<Workspace, WorkspaceError> {
        std::fs::create_dir_all(&self.root).map_err(|e| WorkspaceError::create(e, &self.root))?;

        let dir = self
            .root
            .join(format!("{WORKSPACE_PREFIX}{}", Uuid::new_v4().simple()));
        // create_dir: a name clash is an error, never a shared directory.
        std::fs::create_dir(&dir).map_err(|e| WorkspaceError::create(e, &dir))?;

        let workspace = Workspace {
            source_path: dir.join(format!("{SNIPPET_STEM}.{}", language.source_extension())),
            artifact_path: language
                .is_compiled()
                .then(|| dir.join(format!("{SNIPPET_STEM}{}", std::env::consts::EXE_SUFFIX))),
            dir,
            released: false,
        };

        // On failure `workspace` is dropped here, which removes the directory.
        std::fs::write(&workspace.source_path, source)
            .map_err(|e| WorkspaceError::create(e, &workspace.source_path))?;

        tracing::trace!(
            dir = %workspace.dir.display(),
            %language,
            "Acquired workspace"
        );
        Ok(workspace)
    }
}

/// Directory, source file and artifact path of one snippet invocation
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    source_path: PathBuf,
    artifact_path: Option<PathBuf>,
    released: bool,
}

impl Workspace {
    /// The workspace directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the written source file
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Path the compiled artifact is written to, for compiled languages
    #[must_use]
    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// Remove the workspace directory and everything in it
    ///
    /// A directory that is already gone is not an error.
    pub fn release(mut self) -> Result<(), WorkspaceError> {
        self.released = true;
        remove_dir_if_exists(&self.dir)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_dir_if_exists(&self.dir) {
            tracing::warn!("Failed to remove workspace on drop: {e}");
        }
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), WorkspaceError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkspaceError::remove(e, path)),
    }
}
