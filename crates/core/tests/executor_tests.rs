//! Behavioral tests for the snippet executor.
//!
//! A scripted process runner stands in for `rustc` and `ruby`, so these tests
//! count every toolchain invocation and never depend on installed toolchains.
//! The "language" it understands is one directive per line:
//!
//! - `print <text>` / `eprint <text>`: write a line to stdout / stderr
//! - `exit <n>`: stop with exit code `n`
//! - `loop forever`: never finish (reported as a timeout)
//! - `syntax error` / `slow compile`: fail / time out the compile step
//! - `bad binary`: the compiled artifact cannot be started

use async_trait::async_trait;
use memorun_core::toolchain::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner};
use memorun_core::{Config, Error, LanguageKind, Outcome, SnippetExecutor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct ScriptedRunner {
    calls: AtomicUsize,
    commands: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn programs(&self) -> Vec<PathBuf> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    fn compile(command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
        let source = PathBuf::from(&command.args[0]);
        let artifact = PathBuf::from(&command.args[2]);
        let code = std::fs::read_to_string(&source).unwrap();
        if code.contains("syntax error") {
            return Ok(ProcessOutput {
                exit_code: Some(1),
                stderr: "error: expected one of `!` or `::`, found `error`".to_string(),
                ..ProcessOutput::default()
            });
        }
        if code.contains("slow compile") {
            // A killed rustc leaves codegen objects and its scratch dir behind.
            let dir = artifact.parent().unwrap();
            std::fs::write(dir.join("main.main.3f2a-cgu.0.rcgu.o"), b"obj").unwrap();
            std::fs::create_dir(dir.join("rustcQx81Zp")).unwrap();
            std::fs::write(dir.join("rustcQx81Zp/symbols.o"), b"obj").unwrap();
            return Err(ProcessError::TimedOut {
                program: command.program_name(),
                limit: timeout,
            });
        }
        // The "binary" is the script itself.
        std::fs::write(&artifact, code).unwrap();
        Ok(ProcessOutput {
            exit_code: Some(0),
            ..ProcessOutput::default()
        })
    }

    fn interpret(command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
        let script_path = command
            .args
            .last()
            .map_or_else(|| command.program.clone(), PathBuf::from);
        let script = std::fs::read_to_string(&script_path).unwrap();

        let mut output = ProcessOutput {
            exit_code: Some(0),
            ..ProcessOutput::default()
        };
        for line in script.lines().map(str::trim) {
            if let Some(text) = line.strip_prefix("print ") {
                output.stdout.push_str(text);
                output.stdout.push('\n');
            } else if let Some(text) = line.strip_prefix("eprint ") {
                output.stderr.push_str(text);
                output.stderr.push('\n');
            } else if let Some(code) = line.strip_prefix("exit ") {
                output.exit_code = Some(code.parse().unwrap());
                break;
            } else if line == "loop forever" {
                return Err(ProcessError::TimedOut {
                    program: command.program_name(),
                    limit: timeout,
                });
            } else if line == "bad binary" {
                return Err(ProcessError::Spawn {
                    program: command.program_name(),
                    source: std::io::Error::other("exec format error"),
                });
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.clone());

        if command.program == Path::new("ruby-missing") {
            return Err(ProcessError::Spawn {
                program: command.program_name(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        if command.program == Path::new("rustc") {
            return Self::compile(command, timeout);
        }
        Self::interpret(command, timeout)
    }
}

struct Harness {
    executor: SnippetExecutor,
    runner: Arc<ScriptedRunner>,
    workspace_dir: TempDir,
    _cache_dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let workspace_dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let mut config = Config {
            cache_dir: Some(cache_dir.path().to_path_buf()),
            workspace_dir: Some(workspace_dir.path().to_path_buf()),
            ..Config::default()
        };
        adjust(&mut config);

        let runner = Arc::new(ScriptedRunner::default());
        let executor = SnippetExecutor::new(config)
            .unwrap()
            .with_process_runner(runner.clone());
        Self {
            executor,
            runner,
            workspace_dir,
            _cache_dir: cache_dir,
        }
    }

    fn leftover_workspace_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.workspace_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    fn cached(&self, language: LanguageKind, source: &str) -> Option<String> {
        let fp = self.executor.fingerprint_for(language, source);
        self.executor.store().get(&fp).unwrap()
    }
}

const HELLO: &str = "print Hello from memorun!\nprint 10 + 32 = 42\n";

// =============================================================================
// Scenario A: first run executes, second run is a cache hit
// =============================================================================

#[tokio::test]
async fn second_run_is_served_from_cache_without_toolchain() {
    let h = Harness::new();

    let first = h.executor.run_rust(HELLO).await.unwrap();
    assert_eq!(
        first.outcome,
        Outcome::Executed {
            stdout: "Hello from memorun!\n10 + 32 = 42\n".to_string()
        }
    );
    assert!(!first.is_cache_hit());
    assert_eq!(h.runner.calls(), 2, "compile + run");

    let second = h.executor.run_rust(HELLO).await.unwrap();
    assert!(second.is_cache_hit());
    assert_eq!(second.outcome.stdout(), first.outcome.stdout());
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(h.runner.calls(), 2, "cache hit must not invoke the toolchain");
    assert!(h.leftover_workspace_files().is_empty());
}

#[tokio::test]
async fn compile_step_runs_before_artifact() {
    let h = Harness::new();
    h.executor.run_rust(HELLO).await.unwrap();

    let programs = h.runner.programs();
    assert_eq!(programs.len(), 2);
    assert_eq!(programs[0], PathBuf::from("rustc"));
    assert!(programs[1].starts_with(h.workspace_dir.path()));
}

// =============================================================================
// Scenario B: compilation failure
// =============================================================================

#[tokio::test]
async fn compilation_failure_is_reported_and_not_cached() {
    let h = Harness::new();
    let source = "fn main() { syntax error }";

    let report = h.executor.run_rust(source).await.unwrap();
    match &report.outcome {
        Outcome::CompilationFailed { exit_code, stderr } => {
            assert_eq!(*exit_code, Some(1));
            assert!(!stderr.is_empty());
        }
        other => panic!("expected CompilationFailed, got {other:?}"),
    }
    assert!(!report.is_success());
    assert_eq!(h.runner.calls(), 1, "no execute step after a failed compile");
    assert_eq!(h.cached(LanguageKind::Rust, source), None);
    assert!(h.leftover_workspace_files().is_empty());
}

#[tokio::test]
async fn failures_are_not_replayed() {
    let h = Harness::new();
    let source = "fn main() { syntax error }";

    h.executor.run_rust(source).await.unwrap();
    h.executor.run_rust(source).await.unwrap();
    assert_eq!(h.runner.calls(), 2, "each submission compiles again");
}

// =============================================================================
// Scenario C: runtime failure after partial output
// =============================================================================

#[tokio::test]
async fn runtime_failure_surfaces_partial_stdout() {
    let h = Harness::new();
    let source = "print partial\neprint boom\nexit 3\nprint unreachable\n";

    let report = h.executor.run_rust(source).await.unwrap();
    assert_eq!(
        report.outcome,
        Outcome::RuntimeFailed {
            exit_code: Some(3),
            stdout: "partial\n".to_string(),
            stderr: "boom\n".to_string(),
        }
    );
    assert_eq!(h.cached(LanguageKind::Rust, source), None);
    assert!(h.executor.store().is_empty().unwrap());
    assert!(h.leftover_workspace_files().is_empty());
}

#[tokio::test]
async fn fixed_snippet_runs_from_scratch_after_failure() {
    let h = Harness::new();

    let failed = h.executor.run_ruby("print half\nexit 1\n").await.unwrap();
    assert!(!failed.is_success());

    let fixed = h.executor.run_ruby("print half\nprint done\n").await.unwrap();
    assert_eq!(fixed.outcome.stdout(), Some("half\ndone\n"));
    assert!(!fixed.is_cache_hit());
}

// =============================================================================
// Scenario D: rows are keyed by source, not by output
// =============================================================================

#[tokio::test]
async fn identical_output_from_distinct_snippets_uses_two_rows() {
    let h = Harness::new();

    let a = h.executor.run_ruby("print ok\n").await.unwrap();
    let b = h.executor.run_ruby("print ok\n\n").await.unwrap();
    assert_eq!(a.outcome.stdout(), b.outcome.stdout());
    assert_ne!(a.fingerprint, b.fingerprint);
    assert_eq!(h.executor.store().len().unwrap(), 2);
}

#[tokio::test]
async fn same_text_in_two_languages_does_not_alias() {
    let h = Harness::new();
    let source = "print same\n";

    h.executor.run_rust(source).await.unwrap();
    let ruby = h.executor.run_ruby(source).await.unwrap();
    assert!(!ruby.is_cache_hit());
    assert_eq!(h.executor.store().len().unwrap(), 2);
}

// =============================================================================
// Interpreted path
// =============================================================================

#[tokio::test]
async fn interpreted_snippets_skip_compilation() {
    let h = Harness::new();

    let report = h.executor.run_ruby("print from ruby\n").await.unwrap();
    assert_eq!(report.language, LanguageKind::Ruby);
    assert_eq!(report.outcome.stdout(), Some("from ruby\n"));
    assert_eq!(h.runner.programs(), vec![PathBuf::from("ruby")]);

    let again = h.executor.run_ruby("print from ruby\n").await.unwrap();
    assert!(again.is_cache_hit());
    assert_eq!(h.runner.calls(), 1);
}

#[tokio::test]
async fn empty_output_is_still_cached() {
    let h = Harness::new();

    let first = h.executor.run_rust("exit 0\n").await.unwrap();
    assert_eq!(first.outcome, Outcome::Executed { stdout: String::new() });

    let second = h.executor.run_rust("exit 0\n").await.unwrap();
    assert!(second.is_cache_hit());
    assert_eq!(h.runner.calls(), 2);
}

// =============================================================================
// Timeouts
// =============================================================================

#[tokio::test]
async fn compile_timeout_is_reported_and_cleaned_up() {
    let h = Harness::with_config(|c| c.compile_timeout_ms = 1_500);

    let report = h.executor.run_rust("slow compile").await.unwrap();
    assert_eq!(report.outcome, Outcome::CompileTimeout { limit_ms: 1_500 });
    assert_eq!(h.cached(LanguageKind::Rust, "slow compile"), None);
    assert!(h.leftover_workspace_files().is_empty());
}

#[tokio::test]
async fn run_timeout_is_reported_and_cleaned_up() {
    let h = Harness::with_config(|c| c.run_timeout_ms = 250);

    let report = h.executor.run_ruby("print start\nloop forever\n").await.unwrap();
    assert_eq!(report.outcome, Outcome::RunTimeout { limit_ms: 250 });
    assert!(h.executor.store().is_empty().unwrap());
    assert!(h.leftover_workspace_files().is_empty());
}

// =============================================================================
// Environment failures
// =============================================================================

#[tokio::test]
async fn missing_interpreter_is_an_error() {
    let h = Harness::with_config(|c| c.ruby.interpreter = "ruby-missing".to_string());

    let err = h.executor.run_ruby("print x\n").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Process(ProcessError::Spawn { .. })
    ));
    assert!(h.leftover_workspace_files().is_empty());
}

#[tokio::test]
async fn unstartable_artifact_is_a_runtime_failure() {
    let h = Harness::new();

    let report = h.executor.run_rust("bad binary\n").await.unwrap();
    assert_eq!(report.outcome.to_string(), "runtime failed (no exit status)");
    match report.outcome {
        Outcome::RuntimeFailed {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, None);
            assert!(stderr.contains("exec format error"));
        }
        other => panic!("expected RuntimeFailed, got {other:?}"),
    }
    assert!(h.leftover_workspace_files().is_empty());
}

#[tokio::test]
async fn unusable_workspace_dir_is_an_error() {
    let blocker = TempDir::new().unwrap();
    let file = blocker.path().join("not-a-dir");
    std::fs::write(&file, b"").unwrap();
    let h = Harness::with_config(|c| c.workspace_dir = Some(file.clone()));

    let err = h.executor.run_ruby("print x\n").await.unwrap_err();
    assert!(matches!(err, Error::Workspace(_)));
    assert_eq!(h.runner.calls(), 0);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = Config {
        run_timeout_ms: 0,
        ..Config::default()
    };
    let err = SnippetExecutor::new(config).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

// =============================================================================
// Store lifecycle
// =============================================================================

#[tokio::test]
async fn close_removes_the_cache_file() {
    let h = Harness::new();
    h.executor.run_ruby("print x\n").await.unwrap();
    let path = h.executor.store().path().to_path_buf();
    assert!(path.exists());

    h.executor.close().unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn configuration_is_part_of_the_key() {
    let plain = Harness::new();
    let optimized = Harness::with_config(|c| c.rust.opt_level = "3".to_string());

    assert_ne!(
        plain.executor.fingerprint_for(LanguageKind::Rust, HELLO),
        optimized.executor.fingerprint_for(LanguageKind::Rust, HELLO)
    );
}
