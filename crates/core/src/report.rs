//! Typed results of snippet runs
//!
//! The executor never prints; callers decide how to render a [`RunReport`].

use crate::LanguageKind;
use memorun_cache::Fingerprint;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// What happened to a snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Output served from the cache; no toolchain ran
    CacheHit {
        /// Stored standard output
        stdout: String,
    },
    /// Snippet compiled (if needed) and ran successfully; output was cached
    Executed {
        /// Captured standard output
        stdout: String,
    },
    /// The compiler exited non-zero
    CompilationFailed {
        /// Compiler exit code, if it exited normally
        exit_code: Option<i32>,
        /// Compiler diagnostics
        stderr: String,
    },
    /// The snippet exited non-zero
    RuntimeFailed {
        /// Snippet exit code, if it exited normally
        exit_code: Option<i32>,
        /// Output produced before the failure
        stdout: String,
        /// Error output
        stderr: String,
    },
    /// The compile step exceeded its time limit
    CompileTimeout {
        /// The limit in milliseconds
        limit_ms: u64,
    },
    /// The execute step exceeded its time limit
    RunTimeout {
        /// The limit in milliseconds
        limit_ms: u64,
    },
}

impl Outcome {
    /// Whether the snippet produced usable output
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::CacheHit { .. } | Self::Executed { .. })
    }

    /// Standard output, including partial output of a failed run
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::CacheHit { stdout }
            | Self::Executed { stdout }
            | Self::RuntimeFailed { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// Standard error of a failed step
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CompilationFailed { stderr, .. } | Self::RuntimeFailed { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }

    pub(crate) fn timeout_ms(limit: Duration) -> u64 {
        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit { .. } => f.write_str("cache hit"),
            Self::Executed { .. } => f.write_str("executed"),
            Self::CompilationFailed { exit_code, .. } => {
                write!(f, "compilation failed{}", exit_suffix(*exit_code))
            }
            Self::RuntimeFailed { exit_code, .. } => {
                write!(f, "runtime failed{}", exit_suffix(*exit_code))
            }
            Self::CompileTimeout { limit_ms } => {
                write!(f, "compilation timed out after {limit_ms}ms")
            }
            Self::RunTimeout { limit_ms } => write!(f, "run timed out after {limit_ms}ms"),
        }
    }
}

/// `None` covers both a signal kill and a process that never started
fn exit_suffix(exit_code: Option<i32>) -> String {
    exit_code.map_or_else(
        || " (no exit status)".to_string(),
        |code| format!(" (exit {code})"),
    )
}

/// Result of one [`crate::SnippetExecutor::run`] call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Cache key of the snippet under its configuration
    pub fingerprint: Fingerprint,
    /// Language the snippet ran as
    pub language: LanguageKind,
    /// What happened
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Wall time of the whole call, cache lookup included
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether the snippet produced usable output
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Whether the output came from the cache
    #[must_use]
    pub const fn is_cache_hit(&self) -> bool {
        matches!(self.outcome, Outcome::CacheHit { .. })
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's serialize_with signature
fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    #[allow(clippy::cast_precision_loss)]
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memorun_cache::fingerprint;

    #[test]
    fn test_success_classification() {
        assert!(Outcome::CacheHit { stdout: String::new() }.is_success());
        assert!(Outcome::Executed { stdout: String::new() }.is_success());
        assert!(!Outcome::RunTimeout { limit_ms: 1 }.is_success());
        assert!(
            !Outcome::CompilationFailed {
                exit_code: Some(1),
                stderr: String::new()
            }
            .is_success()
        );
    }

    #[test]
    fn test_partial_stdout_is_exposed() {
        let outcome = Outcome::RuntimeFailed {
            exit_code: Some(101),
            stdout: "partial\n".to_string(),
            stderr: "panicked".to_string(),
        };
        assert_eq!(outcome.stdout(), Some("partial\n"));
        assert_eq!(outcome.stderr(), Some("panicked"));
        assert_eq!(outcome.to_string(), "runtime failed (exit 101)");
    }

    #[test]
    fn test_display_without_exit_status() {
        let outcome = Outcome::RuntimeFailed {
            exit_code: None,
            stdout: String::new(),
            stderr: "failed to start compiled snippet: permission denied".to_string(),
        };
        let shown = outcome.to_string();
        assert_eq!(shown, "runtime failed (no exit status)");
        assert!(!shown.contains("signal"));
    }

    #[test]
    fn test_report_json_shape() {
        let report = RunReport {
            fingerprint: fingerprint(b"puts 1"),
            language: LanguageKind::Ruby,
            outcome: Outcome::Executed {
                stdout: "1\n".to_string(),
            },
            elapsed: Duration::from_millis(250),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "executed");
        assert_eq!(json["language"], "ruby");
        assert_eq!(json["stdout"], "1\n");
        assert_eq!(json["elapsed_ms"], 250.0);
        assert_eq!(json["fingerprint"], fingerprint(b"puts 1").as_hex());
    }

    #[test]
    fn test_timeout_ms_saturates() {
        assert_eq!(Outcome::timeout_ms(Duration::from_secs(2)), 2000);
        assert_eq!(Outcome::timeout_ms(Duration::MAX), u64::MAX);
    }
}
