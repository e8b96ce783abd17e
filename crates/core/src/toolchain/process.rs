//! Subprocess execution with captured output and a hard timeout

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use super::CommandSpec;
use async_trait::async_trait;
use miette::Diagnostic;
use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall time from spawn to exit
    pub duration: Duration,
}

impl ProcessOutput {
    /// Whether the process exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The process could not be run to completion
///
/// A non-zero exit is not an error; it is a normal [`ProcessOutput`].
#[derive(Error, Debug, Diagnostic)]
pub enum ProcessError {
    /// The program could not be started
    #[error("Toolchain program '{program}' could not be started")]
    #[diagnostic(
        code(memorun::toolchain::spawn),
        help("Install the toolchain or point the configuration at it (e.g. `[rust] rustc = ...`)")
    )]
    Spawn {
        /// Program that failed to start
        program: String,
        /// The underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process or reading its output failed
    #[error("Lost track of toolchain process '{program}'")]
    #[diagnostic(code(memorun::toolchain::wait))]
    Wait {
        /// Program being waited on
        program: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process ran longer than allowed and was killed
    #[error("Toolchain process '{program}' timed out after {}ms", limit.as_millis())]
    #[diagnostic(code(memorun::toolchain::timeout))]
    TimedOut {
        /// Program that was killed
        program: String,
        /// The limit that was exceeded
        limit: Duration,
    },
}

/// Runs toolchain command lines
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion, killing it once `timeout` elapses
    async fn run(
        &self,
        command: &CommandSpec,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Spawns real processes on the host with tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcessRunner;

#[async_trait]
impl ProcessRunner for HostProcessRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_os_str())))
            // Snippets reading stdin see EOF instead of blocking.
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %command, timeout_ms = timeout.as_millis(), "Spawning toolchain process");
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: command.program_name(),
            source,
        })?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ProcessError::Wait {
                    program: command.program_name(),
                    source,
                });
            }
            Err(_) => {
                // Kill and reap before returning so the caller can remove
                // whatever the process was writing.
                if let Err(e) = child.kill().await {
                    tracing::warn!(program = %command.program.display(), "Failed to kill timed out process: {e}");
                }
                tracing::warn!(
                    program = %command.program.display(),
                    timeout_ms = timeout.as_millis(),
                    "Toolchain process timed out; killed"
                );
                return Err(ProcessError::TimedOut {
                    program: command.program_name(),
                    limit: timeout,
                });
            }
        };

        let wait_error = |source| ProcessError::Wait {
            program: command.program_name(),
            source,
        };
        let stdout = collect(stdout).await.map_err(wait_error)?;
        let stderr = collect(stderr).await.map_err(wait_error)?;

        let result = ProcessOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            duration: start.elapsed(),
        };
        tracing::debug!(
            program = %command.program.display(),
            exit = ?result.exit_code,
            duration_ms = result.duration.as_millis(),
            "Toolchain process finished"
        );
        Ok(result)
    }
}

/// Read a pipe to the end on its own task so a full pipe never stalls the child
fn drain<R>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).await?;
        Ok(buf)
    })
}

async fn collect(pipe: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match pipe {
        Some(handle) => handle.await.map_err(io::Error::other)?,
        None => Ok(Vec::new()),
    }
}
