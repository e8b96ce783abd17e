//! Rust snippets: `rustc` compile step, then run the produced binary

use super::{CommandSpec, MEMORUN_VERSION, Toolchain};
use crate::LanguageKind;
use crate::config::{EnvOverlay, RustConfig};
use crate::workspace::Workspace;
use memorun_cache::KeyEnvelope;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Compiles with `rustc` using a latency-first flag set
#[derive(Debug, Clone)]
pub struct RustToolchain {
    rustc: PathBuf,
    /// Flags that do not depend on the workspace paths
    flags: Vec<String>,
    env: Vec<(String, OsString)>,
    key_env: BTreeMap<String, String>,
}

impl RustToolchain {
    /// Build the compile template from configuration
    #[must_use]
    pub fn new(config: &RustConfig, overlay: &EnvOverlay, env: Vec<(String, OsString)>) -> Self {
        let mut flags = Vec::new();
        if let Some(target) = &config.target {
            flags.push(format!("--target={target}"));
        }
        flags.extend([
            "-C".to_string(),
            format!("opt-level={}", config.opt_level),
            // Debug info only slows down a binary that runs once.
            "-C".to_string(),
            "debuginfo=0".to_string(),
            "-C".to_string(),
            format!("codegen-units={}", config.codegen_units),
        ]);
        if let Some(linker) = &config.linker {
            flags.push("-C".to_string());
            flags.push(format!("linker={}", linker.display()));
        }
        flags.extend(config.extra_args.iter().cloned());

        Self {
            rustc: overlay.resolve_program(&config.rustc),
            flags,
            env,
            key_env: overlay.key_summary(),
        }
    }

    fn artifact_for(workspace: &Workspace) -> PathBuf {
        workspace.artifact_path().map_or_else(
            || {
                workspace
                    .source_path()
                    .with_extension(std::env::consts::EXE_EXTENSION)
            },
            Path::to_path_buf,
        )
    }
}

impl Toolchain for RustToolchain {
    fn language(&self) -> LanguageKind {
        LanguageKind::Rust
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<CommandSpec> {
        Some(
            CommandSpec::new(&self.rustc)
                .arg(workspace.source_path())
                .arg("-o")
                .arg(Self::artifact_for(workspace))
                .args(&self.flags)
                .envs(self.env.clone()),
        )
    }

    fn run_command(&self, workspace: &Workspace) -> CommandSpec {
        CommandSpec::new(Self::artifact_for(workspace)).envs(self.env.clone())
    }

    fn key_envelope(&self) -> KeyEnvelope {
        KeyEnvelope {
            language: LanguageKind::Rust.as_str().to_string(),
            program: self.rustc.display().to_string(),
            args: self.flags.clone(),
            env: self.key_env.clone(),
            memorun_version: MEMORUN_VERSION.to_string(),
        }
    }
}
