//! Toolchain invocation
//!
//! A [`Toolchain`] turns a [`Workspace`] into the command lines of its compile
//! and execute steps; a [`ProcessRunner`] runs those command lines. The split
//! keeps argument templates testable without spawning anything, and lets the
//! executor swap the host runner for a spy in tests.

mod process;
mod ruby;
mod rust;

pub use process::{HostProcessRunner, ProcessError, ProcessOutput, ProcessRunner};
pub use ruby::RubyToolchain;
pub use rust::RustToolchain;

use crate::config::Config;
use crate::workspace::Workspace;
use crate::{LanguageKind, Result};
use memorun_cache::KeyEnvelope;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// A fully resolved command line for one toolchain step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<OsString>,
    /// Variables set on the child process in addition to the inherited environment
    pub env: Vec<(String, OsString)>,
}

impl CommandSpec {
    /// Create a command with no arguments or environment overlay
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replace the environment overlay
    #[must_use]
    pub fn envs(mut self, env: Vec<(String, OsString)>) -> Self {
        self.env = env;
        self
    }

    /// Program name for messages
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Language-specific command templates
///
/// `compile_command` returns `None` for interpreted languages.
pub trait Toolchain: Send + Sync + fmt::Debug {
    /// Language handled by this toolchain
    fn language(&self) -> LanguageKind;

    /// Command that compiles the workspace source into its artifact
    fn compile_command(&self, workspace: &Workspace) -> Option<CommandSpec>;

    /// Command that executes the snippet
    fn run_command(&self, workspace: &Workspace) -> CommandSpec;

    /// Configuration that must be part of the cache key
    fn key_envelope(&self) -> KeyEnvelope;
}

/// One toolchain per wired-in language
#[derive(Debug)]
pub struct Toolchains {
    rust: RustToolchain,
    ruby: RubyToolchain,
}

impl Toolchains {
    /// Build every toolchain from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let env = config.env.resolve()?;
        Ok(Self {
            rust: RustToolchain::new(&config.rust, &config.env, env.clone()),
            ruby: RubyToolchain::new(&config.ruby, &config.env, env),
        })
    }

    /// Toolchain for a language
    #[must_use]
    pub fn get(&self, language: LanguageKind) -> &dyn Toolchain {
        match language {
            LanguageKind::Rust => &self.rust,
            LanguageKind::Ruby => &self.ruby,
        }
    }
}

/// Version string folded into every cache key
pub(crate) const MEMORUN_VERSION: &str = env!("CARGO_PKG_VERSION");
