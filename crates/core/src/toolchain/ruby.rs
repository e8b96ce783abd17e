//! Ruby snippets: run the source file through the interpreter

use super::{CommandSpec, MEMORUN_VERSION, Toolchain};
use crate::LanguageKind;
use crate::config::{EnvOverlay, RubyConfig};
use crate::workspace::Workspace;
use memorun_cache::KeyEnvelope;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Interprets snippets directly; there is no compile step
#[derive(Debug, Clone)]
pub struct RubyToolchain {
    interpreter: PathBuf,
    extra_args: Vec<String>,
    env: Vec<(String, OsString)>,
    key_env: BTreeMap<String, String>,
}

impl RubyToolchain {
    /// Build the interpreter template from configuration
    #[must_use]
    pub fn new(config: &RubyConfig, overlay: &EnvOverlay, env: Vec<(String, OsString)>) -> Self {
        Self {
            interpreter: overlay.resolve_program(&config.interpreter),
            extra_args: config.extra_args.clone(),
            env,
            key_env: overlay.key_summary(),
        }
    }
}

impl Toolchain for RubyToolchain {
    fn language(&self) -> LanguageKind {
        LanguageKind::Ruby
    }

    fn compile_command(&self, _workspace: &Workspace) -> Option<CommandSpec> {
        None
    }

    fn run_command(&self, workspace: &Workspace) -> CommandSpec {
        CommandSpec::new(&self.interpreter)
            .args(&self.extra_args)
            .arg(workspace.source_path())
            .envs(self.env.clone())
    }

    fn key_envelope(&self) -> KeyEnvelope {
        KeyEnvelope {
            language: LanguageKind::Ruby.as_str().to_string(),
            program: self.interpreter.display().to_string(),
            args: self.extra_args.clone(),
            env: self.key_env.clone(),
            memorun_version: MEMORUN_VERSION.to_string(),
        }
    }
}
