//! memorun CLI library
//!
//! The binary in `main.rs` only parses arguments, sets up tracing and maps
//! the result of [`run`] to an exit code.

pub mod cli;
pub mod commands;
pub mod render;
pub mod tracing;

use crate::cli::{Cli, CliError, Commands, EXIT_OK, EXIT_SNIPPET_FAILED};
use crate::render::Renderer;
use ::tracing::Instrument;
use memorun_core::{Config, SnippetExecutor};
use std::io::{self, Write};

/// Execute a parsed command line, writing reports to stdout
///
/// Returns the exit code for the snippets' outcomes; environment problems
/// come back as [`CliError`].
pub async fn run(cli: Cli) -> Result<i32, CliError> {
    run_with_output(cli, io::stdout()).await
}

/// Like [`run`], with reports written to `out`
pub async fn run_with_output<W: Write>(cli: Cli, out: W) -> Result<i32, CliError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let executor = SnippetExecutor::new(config)?;
    let mut renderer = Renderer::new(cli.command.format(), out);

    let (name, result) = match &cli.command {
        Commands::Run {
            files,
            lang,
            repeat,
            ..
        } => {
            let span = ::tracing::info_span!(
                "command",
                command = "run",
                correlation_id = %crate::tracing::correlation_id(),
            );
            let result = commands::run_files(
                &executor,
                &mut renderer,
                files,
                lang.map(Into::into),
                *repeat,
            )
            .instrument(span)
            .await;
            ("run", result)
        }
        Commands::Demo { .. } => {
            let span = ::tracing::info_span!(
                "command",
                command = "demo",
                correlation_id = %crate::tracing::correlation_id(),
            );
            ("demo", commands::demo(&executor, &mut renderer).instrument(span).await)
        }
    };

    // Tear down the store even when a command failed part way.
    let closed = executor.close();
    result?;
    closed?;

    ::tracing::info!(
        command = name,
        total = renderer.total(),
        failed = renderer.failed(),
        "Command finished"
    );
    Ok(if renderer.failed() > 0 {
        EXIT_SNIPPET_FAILED
    } else {
        EXIT_OK
    })
}
