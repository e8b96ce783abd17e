// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand, ValueEnum};
use memorun_core::LanguageKind;
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Every snippet produced output
pub const EXIT_OK: i32 = 0;
/// At least one snippet failed to compile, crashed or timed out
pub const EXIT_SNIPPET_FAILED: i32 = 1;
/// The environment is unusable: configuration, store, workspace or toolchain
pub const EXIT_ENVIRONMENT: i32 = 2;

/// CLI-level failures; all of them map to [`EXIT_ENVIRONMENT`]
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Error from the executor or its configuration
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] memorun_core::Error),

    /// A snippet file given on the command line is unusable
    #[error("{message}")]
    #[diagnostic(code(memorun::cli::input))]
    Input {
        /// What is wrong with the input
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// Writing reports to stdout failed
    #[error("Failed to write report")]
    #[diagnostic(code(memorun::cli::output))]
    Output(#[source] io::Error),
}

impl CliError {
    /// Create an input error
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    /// Create an input error with help text
    #[must_use]
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Stable short code used in JSON error output
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Core(memorun_core::Error::Configuration { .. }
            | memorun_core::Error::ConfigRead { .. }
            | memorun_core::Error::ConfigParse { .. }) => "config",
            Self::Core(memorun_core::Error::Store(_)) => "store",
            Self::Core(memorun_core::Error::Workspace(_)) => "workspace",
            Self::Core(memorun_core::Error::Process(_)) => "toolchain",
            Self::Input { .. } => "input",
            Self::Output(_) => "output",
        }
    }
}

/// Map CLI error to its exit code
#[must_use]
pub const fn exit_code_for(_err: &CliError) -> i32 {
    EXIT_ENVIRONMENT
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<'a> {
    /// Always "error"
    pub status: &'static str,
    /// Short error category
    pub code: &'a str,
    /// Human readable message
    pub message: String,
}

/// Render an error on the channel matching the output format
pub fn render_error(err: CliError, format: OutputFormat) {
    if format == OutputFormat::Json {
        let envelope = ErrorEnvelope {
            status: "error",
            code: err.code(),
            message: err.to_string(),
        };
        let mut stdout = io::stdout().lock();
        if let Ok(json) = serde_json::to_string(&envelope) {
            let _ = writeln!(stdout, "{json}");
        }
    } else {
        let report = Report::new(err);
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{report:?}");
        let _ = stderr.flush();
    }
}

/// How reports are printed
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human readable sections
    #[default]
    Text,
    /// One JSON object per report
    Json,
}

/// Snippet language selectable on the command line
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Lang {
    /// Compile with rustc, then run the binary
    Rust,
    /// Run with the Ruby interpreter
    Ruby,
}

impl From<Lang> for LanguageKind {
    fn from(lang: Lang) -> Self {
        match lang {
            Lang::Rust => Self::Rust,
            Lang::Ruby => Self::Ruby,
        }
    }
}

/// Run code snippets through their toolchain and replay cached output
#[derive(Parser, Debug)]
#[command(name = "memorun")]
#[command(about = "Run Rust and Ruby snippets, serving repeated runs from a cache")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(long, short = 'c', global = true, env = "MEMORUN_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging verbosity when `RUST_LOG` is unset
    #[arg(
        short = 'L',
        long,
        global = true,
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, global = true, default_value = "compact", value_enum)]
    pub log_format: TracingFormat,

    /// Filter directives (`RUST_LOG` syntax), overriding `RUST_LOG` and `--log-level`
    #[arg(long, global = true, value_name = "DIRECTIVES")]
    pub log_filter: Option<String>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run snippet files
    Run {
        /// Snippet files; the language follows the `.rs` / `.rb` extension
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Language for every file, overriding the extension
        #[arg(long, short = 'l', value_enum)]
        lang: Option<Lang>,

        /// Run each file this many times against the shared cache
        #[arg(
            long,
            short = 'n',
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        repeat: u32,

        /// Report format
        #[arg(long, short = 'f', default_value = "text", value_enum)]
        format: OutputFormat,
    },

    /// Run the built-in Rust snippets twice each to show the cache at work
    Demo {
        /// Report format
        #[arg(long, short = 'f', default_value = "text", value_enum)]
        format: OutputFormat,
    },
}

impl Commands {
    /// Report format requested by the command
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        match self {
            Self::Run { format, .. } | Self::Demo { format } => *format,
        }
    }
}

/// Parse command line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
