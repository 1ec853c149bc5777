//! JSON output helpers.
//!
//! Provides the error-object formatter used by all `--json` code paths when
//! a command fails, and `JsonRenderer` for successful results.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::config::ToolConfig;
use crate::domain::pbxproj::PatchOutcome;
use crate::domain::scan::ScanResult;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Renders command results as pretty-printed JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_scan(&self, target: &Path, result: &ScanResult) -> Result<()> {
        #[derive(Serialize)]
        struct ScanDoc<'a> {
            target: String,
            #[serde(flatten)]
            result: &'a ScanResult,
        }
        print_pretty(&ScanDoc {
            target: target.display().to_string(),
            result,
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_patch(&self, manifest: &Path, outcome: &PatchOutcome, written: bool) -> Result<()> {
        #[derive(Serialize)]
        struct PatchDoc<'a> {
            manifest: String,
            written: bool,
            #[serde(flatten)]
            outcome: &'a PatchOutcome,
        }
        print_pretty(&PatchDoc {
            manifest: manifest.display().to_string(),
            written,
            outcome,
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &ToolConfig, path: &Path) -> Result<()> {
        let obj = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        print_pretty(&obj)
    }
}

fn print_pretty(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}
