//! `iosdevops scan`: run Semgrep against a project directory and report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::config_service;
use crate::application::services::scanner::{self, ScanSettings};
use crate::domain::config::MAX_TIMEOUT_SECS;
use crate::domain::error::ScanError;
use crate::domain::scan::TIMESTAMP_FORMAT;
use crate::output::progress;

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Project directory to scan
    pub target: PathBuf,

    /// Rule pack to apply (repeatable; replaces the configured packs)
    #[arg(long = "rule-pack", value_name = "PACK")]
    pub rule_packs: Vec<String>,

    /// Scan time limit in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    pub timeout: Option<u64>,
}

/// Run the scan command.
///
/// Exits successfully whether or not the scanner found issues or could run
/// at all; only a missing target is an error.
///
/// # Errors
///
/// Returns `ScanError::TargetMissing` if the target does not exist, or an
/// error if the configuration cannot be loaded.
pub async fn run(app: &AppContext, args: &ScanArgs) -> Result<ExitCode> {
    if !args.target.exists() {
        return Err(ScanError::TargetMissing(args.target.clone()).into());
    }

    let config = config_service::load_config(&app.config_store)?;
    let mut settings = ScanSettings::from(&config.scanner);
    if !args.rule_packs.is_empty() {
        settings.rule_packs.clone_from(&args.rule_packs);
    }
    if let Some(secs) = args.timeout {
        settings.timeout = Duration::from_secs(secs);
    }

    let renderer = app.renderer();
    let generated = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    renderer.render_scan_banner(&args.target, &generated);

    let spinner = (app.output.show_progress() && !app.is_json())
        .then(|| progress::spinner("Running Semgrep..."));
    let result = scanner::run_scan(&app.runner, &app.fs, &args.target, &settings).await;
    if let Some(pb) = &spinner {
        progress::finish_clear(pb);
    }

    renderer.render_scan(&args.target, &result)?;
    Ok(ExitCode::SUCCESS)
}
