//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::domain::config::ToolConfig;
use crate::domain::pbxproj::PatchOutcome;
use crate::domain::scan::{Finding, ScanFailure, ScanResult};
use crate::output::OutputContext;

const RULE: &str = "==================================================";

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Banner printed before the scanner starts.
    pub fn render_scan_banner(&self, target: &Path, generated: &str) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("Running Semgrep Security Scan");
        println!("  ================================");
        println!();
        self.ctx.kv("Project:", &target.display().to_string());
        self.ctx.kv("Generated:", generated);
        println!();
        self.ctx.header("Command Output:");
        println!("  -----------------");
    }

    /// Command, raw tool output, summary and footer.
    pub fn render_scan(&self, result: &ScanResult) {
        if !self.ctx.quiet {
            if let Some(command) = &result.command {
                self.ctx.kv("Command:", command);
                println!();
            }
            println!("{}", result.output);
            println!();
        }

        if result.success {
            self.ctx.success("Scan completed successfully");
            match &result.findings {
                Some(summary) if summary.detected => {
                    if summary.structured {
                        self.ctx.warn(&format!(
                            "Security issues found! ({} result{})",
                            summary.findings.len(),
                            if summary.findings.len() == 1 { "" } else { "s" }
                        ));
                        for finding in &summary.findings {
                            self.render_finding(finding);
                        }
                    } else {
                        self.ctx.warn("Security issues found!");
                    }
                }
                _ => self.ctx.success("No security issues found!"),
            }
            if let Some(summary) = result.findings.as_ref().filter(|s| s.tool_errors > 0) {
                self.ctx.warn(&format!(
                    "Semgrep reported {} error(s) while scanning",
                    summary.tool_errors
                ));
            }
        } else {
            println!("  {} Scan failed or found issues", "✗".style(self.ctx.styles.error));
            match &result.error {
                Some(ScanFailure::ToolNotFound) => {
                    self.ctx.info("Reason: Semgrep is not installed or not in PATH");
                    self.ctx
                        .info("Please install Semgrep using one of the methods shown above.");
                }
                Some(failure) => self.ctx.info(&format!("Reason: {}", failure.reason())),
                None => {
                    if let Some(code) = result.return_code {
                        self.ctx.info(&format!("Semgrep exited with status {code}"));
                    }
                }
            }
        }

        if !self.ctx.quiet {
            println!();
            println!("{RULE}");
            println!("End of Semgrep Scan Report");
            println!("{RULE}");
        }
    }

    fn render_finding(&self, finding: &Finding) {
        if self.ctx.quiet {
            return;
        }
        let location = match finding.line {
            Some(line) => format!("{}:{line}", finding.path),
            None => finding.path.clone(),
        };
        let severity = finding.severity.as_deref().unwrap_or("INFO");
        println!(
            "      {}  {}  {}",
            severity.style(self.ctx.styles.severity),
            finding.rule_id,
            location.style(self.ctx.styles.dim)
        );
    }

    /// Summary of a manifest patch. Per-step progress is printed by the
    /// reporter while the patch is prepared.
    pub fn render_patch(&self, manifest: &Path, outcome: &PatchOutcome, written: bool) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.kv("Group id:", &outcome.ids.group);
        self.ctx.kv("File id:", &outcome.ids.file);
        self.ctx.kv("Build file id:", &outcome.ids.build_file);
        println!();
        let applied = outcome.applied.len();
        let total = applied + outcome.missed.len();
        if written {
            self.ctx.success(&format!(
                "Resources folder added to Xcode project ({applied}/{total} entries)"
            ));
        } else {
            self.ctx.info(&format!(
                "{} left unchanged ({applied}/{total} entries would be added)",
                manifest.display()
            ));
        }
    }

    /// Current configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn render_config(&self, config: &ToolConfig, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(config)?;
        self.ctx.header("Configuration:");
        self.ctx.kv("File:", &path.display().to_string());
        println!();
        for line in yaml.lines() {
            println!("  {line}");
        }
        Ok(())
    }
}
