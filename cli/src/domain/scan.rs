//! Scan domain types: the result record, failure kinds, command-line
//! construction and classification of the scanner's JSON report.
//!
//! Pure functions only. The scanner itself is an external process; nothing
//! here inspects source code.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

/// Name of the external scanner binary.
pub const TOOL_NAME: &str = "semgrep";

/// Rule packs passed to the scanner when none are configured.
pub const DEFAULT_RULE_PACKS: &[&str] = &["p/swift", "p/owasp-top-ten", "p/secrets"];

/// Upper bound on a single scan.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on the `which` lookup.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Install locations probed, in order, before falling back to a PATH lookup.
/// A leading `~/` is expanded against the home directory by the caller.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "/opt/homebrew/bin/semgrep",
    "/usr/local/bin/semgrep",
    "~/.local/bin/semgrep",
    "/usr/bin/semgrep",
];

/// `chrono` format for report timestamps, e.g. `Fri Oct 16 10:00:00 +02:00 2026`.
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %:z %Y";

/// Substring used to detect findings when the report cannot be parsed.
const RESULTS_MARKER: &str = "\"results\": [";

// ── Result record ────────────────────────────────────────────────────────────

/// Why a scan did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ScanFailure {
    /// No scanner executable was found.
    ToolNotFound,
    /// The scanner exceeded its time budget and was killed.
    TimedOut,
    /// Spawning or waiting on the scanner failed.
    Fault(String),
}

impl ScanFailure {
    /// Short reason used in reports.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::ToolNotFound => "Semgrep not found",
            Self::TimedOut => "Scan timed out",
            Self::Fault(msg) => msg,
        }
    }
}

/// Outcome of one `run_scan` call. Built once and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// `true` only when the scanner ran and exited with status 0.
    pub success: bool,
    /// Combined stdout and stderr, or a prepared message on failure.
    pub output: String,
    /// The literal command line, when one was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ScanFailure>,
    /// Exit code; `None` when the process was killed by a signal or never ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    /// Classification of the scanner's stdout. Only set when the scanner ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<FindingsSummary>,
}

impl ScanResult {
    /// Result for a host without a scanner; `output` carries install help.
    #[must_use]
    pub fn tool_not_found(instructions: String) -> Self {
        Self {
            success: false,
            output: instructions,
            command: None,
            error: Some(ScanFailure::ToolNotFound),
            return_code: None,
            findings: None,
        }
    }

    #[must_use]
    pub fn timed_out(command: String, limit: Duration) -> Self {
        Self {
            success: false,
            output: format!("Semgrep scan timed out after {}", format_duration(limit)),
            command: Some(command),
            error: Some(ScanFailure::TimedOut),
            return_code: None,
            findings: None,
        }
    }

    #[must_use]
    pub fn fault(command: String, description: String) -> Self {
        Self {
            success: false,
            output: format!("Error running Semgrep: {description}"),
            command: Some(command),
            error: Some(ScanFailure::Fault(description)),
            return_code: None,
            findings: None,
        }
    }

    /// Result for a scanner process that ran to completion.
    #[must_use]
    pub fn completed(command: String, return_code: Option<i32>, stdout: &str, stderr: &str) -> Self {
        Self {
            success: return_code == Some(0),
            output: format!("{stdout}{stderr}"),
            command: Some(command),
            error: None,
            return_code,
            findings: Some(classify_findings(stdout)),
        }
    }
}

// ── Command line ─────────────────────────────────────────────────────────────

/// Arguments passed to the scanner: `scan --config=<pack>... --json --verbose <target>`.
#[must_use]
pub fn scan_args(rule_packs: &[String], target: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(rule_packs.len() + 4);
    args.push("scan".to_string());
    args.extend(rule_packs.iter().map(|pack| format!("--config={pack}")));
    args.push("--json".to_string());
    args.push("--verbose".to_string());
    args.push(target.display().to_string());
    args
}

/// Render a program and its arguments as a single space-joined line.
#[must_use]
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `300s` renders as `5 minutes`, `90s` as `90 seconds`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}

// ── Findings ─────────────────────────────────────────────────────────────────

/// One result reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

/// What the scanner's stdout says about findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingsSummary {
    /// The scanner reported at least one result.
    pub detected: bool,
    /// Individual results; empty when the report could not be parsed.
    pub findings: Vec<Finding>,
    /// Length of the report's `errors` array.
    pub tool_errors: usize,
    /// `false` when the substring fallback decided `detected`.
    pub structured: bool,
}

#[derive(Deserialize)]
struct RawReport {
    results: Vec<RawResult>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    check_id: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    start: Option<RawPosition>,
    #[serde(default)]
    extra: Option<RawExtra>,
}

#[derive(Deserialize)]
struct RawPosition {
    line: Option<u64>,
}

#[derive(Deserialize)]
struct RawExtra {
    severity: Option<String>,
}

/// Classify scanner stdout.
///
/// The whole stream is tried as one JSON report first, then each line that
/// looks like a JSON object. When nothing parses, findings are assumed if a
/// `"results": [` marker is followed by anything other than `]`.
#[must_use]
pub fn classify_findings(stdout: &str) -> FindingsSummary {
    match parse_report(stdout) {
        Some(report) => {
            let findings: Vec<Finding> = report
                .results
                .into_iter()
                .map(|r| Finding {
                    rule_id: r.check_id,
                    path: r.path,
                    line: r.start.and_then(|p| p.line),
                    severity: r.extra.and_then(|e| e.severity),
                })
                .collect();
            FindingsSummary {
                detected: !findings.is_empty(),
                findings,
                tool_errors: report.errors.len(),
                structured: true,
            }
        }
        None => FindingsSummary {
            detected: has_results_marker(stdout),
            ..FindingsSummary::default()
        },
    }
}

fn parse_report(stdout: &str) -> Option<RawReport> {
    let trimmed = stdout.trim();
    if let Ok(report) = serde_json::from_str::<RawReport>(trimmed) {
        return Some(report);
    }
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<RawReport>(line).ok())
}

fn has_results_marker(text: &str) -> bool {
    text.match_indices(RESULTS_MARKER).any(|(idx, m)| {
        !text[idx + m.len()..].trim_start().starts_with(']')
    })
}

// ── Installation help ────────────────────────────────────────────────────────

/// Help text returned in place of scanner output when no executable exists.
#[must_use]
pub fn installation_instructions(generated_on: &str, target: &Path) -> String {
    let packs = DEFAULT_RULE_PACKS
        .iter()
        .map(|p| format!("--config {p}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "
Semgrep Security Scanner Analysis Report
========================================

Generated on: {generated_on}
Project directory: {target}

To use Semgrep security scanning, please install Semgrep on your system:

Option 1 - Using pip:
  pip install semgrep

Option 2 - Using Homebrew:
  brew install semgrep

Option 3 - Using conda:
  conda install -c conda-forge semgrep

After installation, you can run security scans on your iOS projects.

For more information, visit: https://semgrep.dev/docs/getting-started/

Note: iosdevops provides a convenient interface for Semgrep scanning.
      The actual security analysis is performed by Semgrep itself.

To run a comprehensive security scan manually, use:
  # JSON output for programmatic processing:
  semgrep scan {packs} --json --verbose . > semgrep_results.json

  # Human-readable output:
  semgrep scan {packs} --verbose . > semgrep_results.txt

  # This will scan all files in the current directory with:
    - Swift-specific security rules
    - OWASP Top 10 security vulnerabilities
    - Secret detection (API keys, passwords, etc.)

Semgrep not found or not executable.
Please install Semgrep or ensure it's in your PATH.
",
        target = target.display(),
    )
}
