//! Application service: locate the Semgrep executable and run a scan.
//!
//! The scanner never fails the caller: every outcome, including a missing
//! executable, a timeout or a spawn fault, comes back as a [`ScanResult`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{CommandRunner, ExecutableProbe, WorkingDir};
use crate::domain::config::ScannerConfig;
use crate::domain::error::RunnerError;
use crate::domain::scan::{
    ScanResult, TIMESTAMP_FORMAT, TOOL_NAME, command_line, installation_instructions, scan_args,
};

/// Inputs for one scan, resolved from configuration and flags.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub rule_packs: Vec<String>,
    pub timeout: Duration,
    /// Candidate paths as configured; `~/` is expanded at lookup time.
    pub candidates: Vec<String>,
    pub path_lookup: bool,
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            rule_packs: cfg.rule_packs.clone(),
            timeout: cfg.timeout(),
            candidates: cfg.candidates.clone(),
            path_lookup: cfg.path_lookup,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

/// Find the scanner executable.
///
/// Candidates are probed in order; the first existing executable wins. When
/// none matches and `path_lookup` is set, `which semgrep` runs under the
/// runner's default timeout and its answer is accepted only if it is itself
/// an executable file.
pub async fn locate_executable(
    runner: &impl CommandRunner,
    probe: &impl ExecutableProbe,
    settings: &ScanSettings,
) -> Option<PathBuf> {
    let home = probe.home_dir();
    for raw in &settings.candidates {
        let Some(candidate) = expand_home(raw, home.as_deref()) else {
            continue;
        };
        if probe.is_executable(&candidate) {
            tracing::debug!(path = %candidate.display(), "scanner candidate matched");
            return Some(candidate);
        }
    }

    if !settings.path_lookup {
        return None;
    }

    match runner.run("which", &[TOOL_NAME]).await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let found = PathBuf::from(stdout.lines().next()?.trim());
            if probe.is_executable(&found) {
                tracing::debug!(path = %found.display(), "scanner found on PATH");
                Some(found)
            } else {
                None
            }
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "which lookup failed");
            None
        }
    }
}

/// Run the scanner against `target`.
///
/// The process working directory is switched to the target for the duration
/// of the run and restored on every exit path.
pub async fn run_scan<H>(
    runner: &impl CommandRunner,
    host: &H,
    target: &Path,
    settings: &ScanSettings,
) -> ScanResult
where
    H: ExecutableProbe + WorkingDir,
{
    let Some(exe) = locate_executable(runner, host, settings).await else {
        let generated = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        return ScanResult::tool_not_found(installation_instructions(&generated, target));
    };

    let resolved = host
        .canonicalize(target)
        .unwrap_or_else(|_| target.to_path_buf());
    let program = exe.display().to_string();
    let args = scan_args(&settings.rule_packs, &resolved);
    let command = command_line(&program, &args);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let guard = match WorkdirGuard::enter(host, &resolved) {
        Ok(guard) => guard,
        Err(e) => return ScanResult::fault(command, format!("{e:#}")),
    };
    tracing::info!(%command, "running scanner");
    let outcome = runner
        .run_with_timeout(&program, &arg_refs, settings.timeout)
        .await;
    drop(guard);

    match outcome {
        Ok(output) => ScanResult::completed(
            command,
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ),
        Err(e) if is_timeout(&e) => ScanResult::timed_out(command, settings.timeout),
        Err(e) => ScanResult::fault(command, format!("{e:#}")),
    }
}

fn is_timeout(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::TimedOut { .. })
    )
}

fn expand_home(raw: &str, home: Option<&Path>) -> Option<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => home.map(|h| h.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

/// Holds the process inside a directory; the previous directory is restored
/// on drop.
pub struct WorkdirGuard<'a, W: WorkingDir> {
    dir: &'a W,
    previous: PathBuf,
}

impl<'a, W: WorkingDir> WorkdirGuard<'a, W> {
    /// Record the current directory and switch to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be read or `path`
    /// cannot be entered. The working directory is unchanged in that case.
    pub fn enter(dir: &'a W, path: &Path) -> Result<Self> {
        let previous = dir.current_dir()?;
        dir.set_current_dir(path)?;
        Ok(Self { dir, previous })
    }
}

impl<W: WorkingDir> Drop for WorkdirGuard<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = self.dir.set_current_dir(&self.previous) {
            tracing::warn!(
                error = %e,
                path = %self.previous.display(),
                "failed to restore working directory"
            );
        }
    }
}
