//! Snippet execution with memoized results
//!
//! memorun runs ad-hoc Rust and Ruby snippets through their external
//! toolchain and caches the captured standard output under a fingerprint of
//! the exact source text (plus the toolchain configuration), so running the
//! same snippet again returns instantly.
//!
//! ```no_run
//! # async fn demo() -> memorun_core::Result<()> {
//! use memorun_core::{Config, SnippetExecutor};
//!
//! let executor = SnippetExecutor::new(Config::default())?;
//! let first = executor.run_rust("fn main() { println!(\"hi\"); }").await?;
//! let second = executor.run_rust("fn main() { println!(\"hi\"); }").await?;
//! assert!(second.is_cache_hit());
//! assert_eq!(first.outcome.stdout(), second.outcome.stdout());
//! executor.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod executor;
mod language;
pub mod report;
pub mod toolchain;
pub mod workspace;

pub use config::Config;
pub use error::{Error, Result};
pub use executor::SnippetExecutor;
pub use language::LanguageKind;
pub use report::{Outcome, RunReport};
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};

// Re-exported so callers can name cache keys without a direct dependency.
pub use memorun_cache::{Fingerprint, StoreError};
