//! `run` and `demo` command implementations

use crate::cli::CliError;
use crate::render::Renderer;
use memorun_core::{LanguageKind, SnippetExecutor};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Snippets shown by `memorun demo`
pub const DEMO_SNIPPETS: [(&str, &str); 3] = [
    (
        "First snippet",
        r#"
fn main() {
    println!("Hello from memorun!");
    let a = 10;
    let b = 32;
    println!("10 + 32 = {}", a + b);
}
"#,
    ),
    (
        "Second snippet",
        r#"
fn factorial(n: u64) -> u64 {
    if n <= 1 { 1 } else { n * factorial(n - 1) }
}
fn main() {
    println!("5! = {}", factorial(5));
}
"#,
    ),
    (
        "Third snippet",
        r#"
fn main() {
    let mut sum = 0;
    for i in 1..=1000 { sum += i; }
    println!("Sum 1..1000 = {}", sum);
}
"#,
    ),
];

/// A snippet file read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetFile {
    /// Path as given on the command line
    pub path: PathBuf,
    /// Language the file runs as
    pub language: LanguageKind,
    /// File contents
    pub source: String,
}

impl SnippetFile {
    /// Read `path`, taking the language from `lang` or the file extension
    pub async fn load(path: &Path, lang: Option<LanguageKind>) -> Result<Self, CliError> {
        let language = lang.or_else(|| LanguageKind::from_path(path)).ok_or_else(|| {
            CliError::input_with_help(
                format!("Cannot tell the language of {}", path.display()),
                "Use a .rs or .rb extension, or pass --lang rust|ruby",
            )
        })?;
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            CliError::input_with_help(
                format!("Failed to read snippet {}: {e}", path.display()),
                "Check that the file exists and is UTF-8 text",
            )
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            language,
            source,
        })
    }
}

/// Run every file `repeat` times, rendering each report as it completes
///
/// All files are read before the first one runs, so a bad path fails fast.
pub async fn run_files<W: Write>(
    executor: &SnippetExecutor,
    renderer: &mut Renderer<W>,
    files: &[PathBuf],
    lang: Option<LanguageKind>,
    repeat: u32,
) -> Result<(), CliError> {
    let mut snippets = Vec::with_capacity(files.len());
    for path in files {
        snippets.push(SnippetFile::load(path, lang).await?);
    }
    tracing::debug!(files = snippets.len(), repeat, "Loaded snippet files");

    for snippet in &snippets {
        let label = snippet.path.display().to_string();
        renderer.heading(&label).map_err(CliError::Output)?;
        for run in 1..=repeat {
            let report = executor.run(snippet.language, &snippet.source).await?;
            renderer
                .report(&label, run, &report)
                .map_err(CliError::Output)?;
        }
    }
    Ok(())
}

/// Run each demo snippet twice: once through rustc, once from the cache
pub async fn demo<W: Write>(
    executor: &SnippetExecutor,
    renderer: &mut Renderer<W>,
) -> Result<(), CliError> {
    for (title, source) in DEMO_SNIPPETS {
        renderer.heading(title).map_err(CliError::Output)?;
        for run in 1..=2 {
            let report = executor.run_rust(source).await?;
            renderer
                .report(title, run, &report)
                .map_err(CliError::Output)?;
        }
    }
    Ok(())
}
