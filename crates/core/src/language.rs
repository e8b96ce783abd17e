//! Languages memorun knows how to run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Language of a snippet, selecting its toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    /// Rust, compiled with `rustc` and then executed
    Rust,
    /// Ruby, run directly by the interpreter
    Ruby,
}

impl LanguageKind {
    /// All wired-in languages
    pub const ALL: [Self; 2] = [Self::Rust, Self::Ruby];

    /// Whether a compile step precedes execution
    #[must_use]
    pub const fn is_compiled(self) -> bool {
        matches!(self, Self::Rust)
    }

    /// File extension for snippet sources, without the dot
    #[must_use]
    pub const fn source_extension(self) -> &'static str {
        match self {
            Self::Rust => "rs",
            Self::Ruby => "rb",
        }
    }

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Ruby => "ruby",
        }
    }

    /// Infer the language from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|lang| lang.source_extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LanguageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rust" | "rs" => Ok(Self::Rust),
            "ruby" | "rb" => Ok(Self::Ruby),
            _ => Err(format!("Unknown language: {s} (expected rust or ruby)")),
        }
    }
}
