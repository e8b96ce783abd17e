//! Report rendering for stdout

use crate::cli::OutputFormat;
use memorun_core::{Outcome, RunReport};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

/// One line of JSON output
#[derive(Serialize)]
struct ReportLine<'a> {
    snippet: &'a str,
    run: u32,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Writes reports as they arrive and tallies failures
#[derive(Debug)]
pub struct Renderer<W> {
    format: OutputFormat,
    out: W,
    total: usize,
    failed: usize,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer writing to `out`
    pub const fn new(format: OutputFormat, out: W) -> Self {
        Self {
            format,
            out,
            total: 0,
            failed: 0,
        }
    }

    /// Text heading for a group of runs; ignored in JSON mode
    pub fn heading(&mut self, title: &str) -> io::Result<()> {
        if self.format == OutputFormat::Text {
            writeln!(self.out, "\n=== {title} ===")?;
        }
        Ok(())
    }

    /// Write one report
    pub fn report(&mut self, snippet: &str, run: u32, report: &RunReport) -> io::Result<()> {
        self.total += 1;
        if !report.is_success() {
            self.failed += 1;
        }

        match self.format {
            OutputFormat::Json => {
                let line = ReportLine {
                    snippet,
                    run,
                    report,
                };
                serde_json::to_writer(&mut self.out, &line).map_err(io::Error::other)?;
                writeln!(self.out)?;
            }
            OutputFormat::Text => self.write_text(run, report)?,
        }
        self.out.flush()
    }

    fn write_text(&mut self, run: u32, report: &RunReport) -> io::Result<()> {
        let tag = match &report.outcome {
            Outcome::CacheHit { .. } => "[cache]",
            Outcome::Executed { .. } => "[run]",
            _ => "[failed]",
        };
        writeln!(
            self.out,
            "{tag} run {run}: {} in {} ({}, {})",
            report.outcome,
            format_duration(report.elapsed),
            report.language,
            report.fingerprint.short()
        )?;

        if let Some(stdout) = report.outcome.stdout() {
            write_block(&mut self.out, stdout)?;
        }
        if let Some(stderr) = report.outcome.stderr().filter(|s| !s.is_empty()) {
            writeln!(self.out, "--- stderr ---")?;
            write_block(&mut self.out, stderr)?;
        }
        Ok(())
    }

    /// Number of reports written
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Number of reports that were not successful
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_block(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.is_empty() && !text.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_millis(1) {
        format!("{}µs", duration.as_micros())
    } else if duration < Duration::from_secs(1) {
        format!("{:.1}ms", duration.as_secs_f64() * 1000.0)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memorun_core::{Fingerprint, LanguageKind};

    fn report(outcome: Outcome, elapsed: Duration) -> RunReport {
        RunReport {
            fingerprint: Fingerprint::from_hex(&"ab".repeat(32)).unwrap(),
            language: LanguageKind::Rust,
            outcome,
            elapsed,
        }
    }

    fn text_of(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_text_shows_timing_and_cache_tag() {
        let mut r = Renderer::new(OutputFormat::Text, Vec::new());
        r.heading("First snippet").unwrap();
        r.report(
            "first",
            1,
            &report(
                Outcome::Executed {
                    stdout: "5! = 120\n".to_string(),
                },
                Duration::from_millis(812),
            ),
        )
        .unwrap();
        r.report(
            "first",
            2,
            &report(
                Outcome::CacheHit {
                    stdout: "5! = 120\n".to_string(),
                },
                Duration::from_micros(420),
            ),
        )
        .unwrap();
        assert_eq!(r.total(), 2);
        assert_eq!(r.failed(), 0);

        let text = text_of(r);
        assert!(text.contains("=== First snippet ==="));
        assert!(text.contains("[run] run 1: executed in 812.0ms (rust, abababababab)"));
        assert!(text.contains("[cache] run 2: cache hit in 420µs"));
        assert_eq!(text.matches("5! = 120\n").count(), 2);
    }

    #[test]
    fn test_text_failure_includes_stderr() {
        let mut r = Renderer::new(OutputFormat::Text, Vec::new());
        r.report(
            "bad.rs",
            1,
            &report(
                Outcome::CompilationFailed {
                    exit_code: Some(1),
                    stderr: "error[E0308]: mismatched types".to_string(),
                },
                Duration::from_secs(2),
            ),
        )
        .unwrap();
        assert_eq!(r.failed(), 1);

        let text = text_of(r);
        assert!(text.contains("[failed] run 1: compilation failed (exit 1) in 2.00s"));
        assert!(text.contains("--- stderr ---\nerror[E0308]: mismatched types\n"));
    }

    #[test]
    fn test_json_lines() {
        let mut r = Renderer::new(OutputFormat::Json, Vec::new());
        r.heading("ignored").unwrap();
        r.report(
            "hello.rb",
            2,
            &report(
                Outcome::RunTimeout { limit_ms: 10_000 },
                Duration::from_secs(10),
            ),
        )
        .unwrap();

        let text = text_of(r);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["snippet"], "hello.rb");
        assert_eq!(value["run"], 2);
        assert_eq!(value["status"], "run_timeout");
        assert_eq!(value["limit_ms"], 10_000);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(15)), "15µs");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.5ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
    }
}
