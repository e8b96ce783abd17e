//! Configuration types for memorun
//!
//! Loaded from a camelCase TOML file; every field has a default so an empty
//! file (or no file) is a valid configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optimization levels accepted by `rustc -C opt-level`
const OPT_LEVELS: [&str; 6] = ["0", "1", "2", "3", "s", "z"];

/// Main configuration structure for memorun
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    /// Directory for the result store file (system temp dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for snippet sources and artifacts (system temp dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,

    /// Upper bound for a compile step, in milliseconds
    pub compile_timeout_ms: u64,

    /// Upper bound for an execute step, in milliseconds
    pub run_timeout_ms: u64,

    /// Rust toolchain settings
    pub rust: RustConfig,

    /// Ruby toolchain settings
    pub ruby: RubyConfig,

    /// Environment overlay handed to every toolchain process
    pub env: EnvOverlay,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            workspace_dir: None,
            compile_timeout_ms: 60_000,
            run_timeout_ms: 10_000,
            rust: RustConfig::default(),
            ruby: RubyConfig::default(),
            env: EnvOverlay::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::config_read(e, path))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| Error::config_parse(path, e.to_string()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.compile_timeout_ms == 0 {
            return Err(Error::configuration("compileTimeoutMs must be greater than 0"));
        }
        if self.run_timeout_ms == 0 {
            return Err(Error::configuration("runTimeoutMs must be greater than 0"));
        }
        self.rust.validate()?;
        self.ruby.validate()
    }

    /// Compile step timeout
    #[must_use]
    pub const fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    /// Execute step timeout
    #[must_use]
    pub const fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    /// Directory that holds snippet workspaces
    #[must_use]
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Settings for compiling Rust snippets with `rustc`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RustConfig {
    /// Compiler program
    pub rustc: String,

    /// Target triple; host target when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// `-C opt-level`; kept minimal because snippets run once
    pub opt_level: String,

    /// `-C codegen-units`
    pub codegen_units: u32,

    /// Linker passed as `-C linker=...`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker: Option<PathBuf>,

    /// Extra compiler arguments appended to the template
    pub extra_args: Vec<String>,
}

impl Default for RustConfig {
    fn default() -> Self {
        Self {
            rustc: "rustc".to_string(),
            target: None,
            opt_level: "0".to_string(),
            codegen_units: 16,
            linker: None,
            extra_args: Vec::new(),
        }
    }
}

impl RustConfig {
    fn validate(&self) -> Result<()> {
        if self.rustc.trim().is_empty() {
            return Err(Error::configuration("rust.rustc must not be empty"));
        }
        if !OPT_LEVELS.contains(&self.opt_level.as_str()) {
            return Err(Error::configuration(format!(
                "rust.optLevel must be one of {}, got '{}'",
                OPT_LEVELS.join(", "),
                self.opt_level
            )));
        }
        if self.codegen_units == 0 {
            return Err(Error::configuration("rust.codegenUnits must be greater than 0"));
        }
        if self.target.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::configuration("rust.target must not be empty when set"));
        }
        Ok(())
    }
}

/// Settings for running Ruby snippets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RubyConfig {
    /// Interpreter program
    pub interpreter: String,

    /// Arguments placed before the source path
    pub extra_args: Vec<String>,
}

impl Default for RubyConfig {
    fn default() -> Self {
        Self {
            interpreter: "ruby".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl RubyConfig {
    fn validate(&self) -> Result<()> {
        if self.interpreter.trim().is_empty() {
            return Err(Error::configuration("ruby.interpreter must not be empty"));
        }
        Ok(())
    }
}

/// Environment changes applied to toolchain processes only
///
/// memorun never mutates its own process environment; the overlay is set on
/// each spawned command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EnvOverlay {
    /// Directories prepended to `PATH`
    pub path_prefix: Vec<PathBuf>,

    /// Variables set on the child process
    pub vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    /// Whether the overlay changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path_prefix.is_empty() && self.vars.is_empty()
    }

    /// Variables to set on a child process, with `PATH` expanded
    pub fn resolve(&self) -> Result<Vec<(String, OsString)>> {
        let mut resolved: Vec<(String, OsString)> = self
            .vars
            .iter()
            .filter(|(key, _)| key.as_str() != "PATH" || self.path_prefix.is_empty())
            .map(|(key, value)| (key.clone(), OsString::from(value)))
            .collect();

        if !self.path_prefix.is_empty() {
            let base = self
                .vars
                .get("PATH")
                .map(OsString::from)
                .or_else(|| std::env::var_os("PATH"))
                .unwrap_or_default();
            let mut entries = self.path_prefix.clone();
            entries.extend(std::env::split_paths(&base));
            let path = std::env::join_paths(entries)
                .map_err(|e| Error::configuration(format!("env.pathPrefix: {e}")))?;
            resolved.push(("PATH".to_string(), path));
        }
        Ok(resolved)
    }

    /// Resolve a bare program name against the prefix directories
    ///
    /// Falls back to the name itself so the regular `PATH` lookup applies.
    #[must_use]
    pub fn resolve_program(&self, program: &str) -> PathBuf {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return candidate.to_path_buf();
        }
        self.path_prefix
            .iter()
            .flat_map(|dir| {
                [
                    dir.join(program),
                    dir.join(format!("{program}{}", std::env::consts::EXE_SUFFIX)),
                ]
            })
            .find(|path| path.is_file())
            .unwrap_or_else(|| candidate.to_path_buf())
    }

    /// Stable summary for cache keys; excludes the inherited `PATH`
    #[must_use]
    pub fn key_summary(&self) -> BTreeMap<String, String> {
        let mut summary = self.vars.clone();
        if !self.path_prefix.is_empty() {
            let joined = self
                .path_prefix
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            summary.insert("memorun.pathPrefix".to_string(), joined);
        }
        summary
    }
}
