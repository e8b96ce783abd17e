//! Snippet executor: cache lookup, toolchain run, memoization
//!
//! Per invocation:
//!
//! ```text
//! Start → CacheCheck ─┬─ hit ──────────────────────────────→ CacheHit
//!                     └─ miss → Compile ─┬─ fail/timeout ──→ CompilationFailed | CompileTimeout
//!                                        └─ ok → Run ─┬─ fail/timeout → RuntimeFailed | RunTimeout
//!                                                     └─ ok ─────────→ Executed (cached)
//! ```
//!
//! The workspace acquired on a miss is released on every path out of the
//! compile and run steps. Nothing but `Executed` output is ever written to
//! the store, and nothing is retried.

use crate::config::Config;
use crate::report::{Outcome, RunReport};
use crate::toolchain::{HostProcessRunner, ProcessError, ProcessRunner, Toolchain, Toolchains};
use crate::workspace::{Workspace, WorkspaceManager};
use crate::{LanguageKind, Result};
use memorun_cache::{Fingerprint, ResultStore};
use std::sync::Arc;
use std::time::Instant;

/// Runs snippets through their toolchain, memoizing successful output
pub struct SnippetExecutor {
    config: Config,
    store: ResultStore,
    workspaces: WorkspaceManager,
    toolchains: Toolchains,
    runner: Arc<dyn ProcessRunner>,
}

impl SnippetExecutor {
    /// Create an executor with a fresh, process-lifetime result store
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let toolchains = Toolchains::from_config(&config)?;
        let store = ResultStore::open_temporary(config.cache_dir.as_deref())?;
        let workspaces = WorkspaceManager::new(config.workspace_root());

        tracing::info!(
            store = %store.path().display(),
            workspaces = %workspaces.root().display(),
            "Snippet executor ready"
        );

        Ok(Self {
            config,
            store,
            workspaces,
            toolchains,
            runner: Arc::new(HostProcessRunner),
        })
    }

    /// Replace the process runner used for toolchain steps
    #[must_use]
    pub fn with_process_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The backing result store
    #[must_use]
    pub const fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Cache key a snippet would be stored under
    #[must_use]
    pub fn fingerprint_for(&self, language: LanguageKind, source: &str) -> Fingerprint {
        let toolchain = self.toolchains.get(language);
        Fingerprint::for_invocation(source.as_bytes(), &toolchain.key_envelope())
    }

    /// Run a Rust snippet
    pub async fn run_rust(&self, source: &str) -> Result<RunReport> {
        self.run(LanguageKind::Rust, source).await
    }

    /// Run a Ruby snippet
    pub async fn run_ruby(&self, source: &str) -> Result<RunReport> {
        self.run(LanguageKind::Ruby, source).await
    }

    /// Run a snippet, serving it from the cache when possible
    ///
    /// Compile and runtime failures come back as report data. Store,
    /// workspace and spawn failures are returned as errors.
    #[tracing::instrument(name = "run_snippet", skip(self, source), fields(bytes = source.len()))]
    pub async fn run(&self, language: LanguageKind, source: &str) -> Result<RunReport> {
        let start = Instant::now();
        let toolchain = self.toolchains.get(language);
        let fingerprint = Fingerprint::for_invocation(source.as_bytes(), &toolchain.key_envelope());

        if let Some(stdout) = self.store.get(&fingerprint)? {
            tracing::info!(fingerprint = %fingerprint.short(), "Cache hit");
            return Ok(RunReport {
                fingerprint,
                language,
                outcome: Outcome::CacheHit { stdout },
                elapsed: start.elapsed(),
            });
        }

        tracing::info!(fingerprint = %fingerprint.short(), "Cache miss; invoking toolchain");
        let workspace = self.workspaces.acquire(source.as_bytes(), language)?;
        let result = self.execute(toolchain, &workspace).await;
        let released = workspace.release();
        let outcome = result?;
        released?;

        if let Outcome::Executed { stdout } = &outcome {
            self.store.put(&fingerprint, stdout)?;
        }

        let elapsed = start.elapsed();
        tracing::info!(
            fingerprint = %fingerprint.short(),
            outcome = %outcome,
            duration_ms = elapsed.as_millis(),
            "Snippet finished"
        );
        Ok(RunReport {
            fingerprint,
            language,
            outcome,
            elapsed,
        })
    }

    async fn execute(&self, toolchain: &dyn Toolchain, workspace: &Workspace) -> Result<Outcome> {
        if let Some(compile) = toolchain.compile_command(workspace) {
            match self.runner.run(&compile, self.config.compile_timeout()).await {
                Ok(output) if output.success() => {
                    tracing::debug!(duration_ms = output.duration.as_millis(), "Compiled snippet");
                }
                Ok(output) => {
                    return Ok(Outcome::CompilationFailed {
                        exit_code: output.exit_code,
                        stderr: output.stderr,
                    });
                }
                Err(ProcessError::TimedOut { limit, .. }) => {
                    return Ok(Outcome::CompileTimeout {
                        limit_ms: Outcome::timeout_ms(limit),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let run = toolchain.run_command(workspace);
        match self.runner.run(&run, self.config.run_timeout()).await {
            Ok(output) if output.success() => Ok(Outcome::Executed {
                stdout: output.stdout,
            }),
            Ok(output) => Ok(Outcome::RuntimeFailed {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Err(ProcessError::TimedOut { limit, .. }) => Ok(Outcome::RunTimeout {
                limit_ms: Outcome::timeout_ms(limit),
            }),
            // A binary we just built that will not start (e.g. built for another
            // target) is the snippet's failure, not a missing toolchain.
            Err(ProcessError::Spawn { source, .. }) if toolchain.language().is_compiled() => {
                Ok(Outcome::RuntimeFailed {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("failed to start compiled snippet: {source}"),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Tear down the result store, deleting its file
    pub fn close(self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }
}

impl std::fmt::Debug for SnippetExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetExecutor")
            .field("store", &self.store.path())
            .field("workspaces", &self.workspaces.root())
            .field("toolchains", &self.toolchains)
            .finish_non_exhaustive()
    }
}
