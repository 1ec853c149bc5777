//! Unit tests for the scanner service: executable lookup, result building and
//! working-directory handling.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use iosdevops_cli::application::services::scanner::{
    ScanSettings, WorkdirGuard, locate_executable, run_scan,
};
use iosdevops_cli::domain::scan::ScanFailure;
use iosdevops_cli::infra::fs::LocalFs;
use serial_test::serial;

use crate::mocks::{MockHost, ScanBehaviour, ScriptedRunner};

const SEMGREP: &str = "/opt/homebrew/bin/semgrep";

const ONE_RESULT: &str = r#"{"results":[{"check_id":"swift.crypto.insecure-random","path":"App/Token.swift","start":{"line":12,"col":5},"extra":{"severity":"WARNING"}}],"errors":[]}"#;
const NO_RESULTS: &str = r#"{"results":[],"errors":[]}"#;

fn settings() -> ScanSettings {
    ScanSettings {
        rule_packs: vec!["p/swift".into(), "p/secrets".into()],
        timeout: Duration::from_secs(300),
        candidates: vec!["/usr/local/bin/semgrep".into(), SEMGREP.into()],
        path_lookup: false,
    }
}

// ── Executable lookup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_locate_takes_first_existing_candidate() {
    let host = MockHost::new(&[SEMGREP, "/usr/local/bin/semgrep"]);
    let runner = ScriptedRunner::exiting(0, "");
    let found = locate_executable(&runner, &host, &settings()).await;
    assert_eq!(found, Some(PathBuf::from("/usr/local/bin/semgrep")));
}

#[tokio::test]
async fn test_locate_expands_home_candidates() {
    let host = MockHost::new(&["/Users/dev/.local/bin/semgrep"]);
    let runner = ScriptedRunner::exiting(0, "");
    let mut s = settings();
    s.candidates = vec!["~/.local/bin/semgrep".into()];
    let found = locate_executable(&runner, &host, &s).await;
    assert_eq!(found, Some(PathBuf::from("/Users/dev/.local/bin/semgrep")));
}

#[tokio::test]
async fn test_locate_falls_back_to_which() {
    let host = MockHost::new(&["/opt/tools/semgrep"]);
    let mut runner = ScriptedRunner::exiting(0, "");
    runner.which = Some("/opt/tools/semgrep".into());
    let mut s = settings();
    s.candidates.clear();
    s.path_lookup = true;
    let found = locate_executable(&runner, &host, &s).await;
    assert_eq!(found, Some(PathBuf::from("/opt/tools/semgrep")));
}

#[tokio::test]
async fn test_locate_rejects_which_answer_that_is_not_executable() {
    let host = MockHost::new(&[]);
    let mut runner = ScriptedRunner::exiting(0, "");
    runner.which = Some("/opt/tools/semgrep".into());
    let mut s = settings();
    s.path_lookup = true;
    assert_eq!(locate_executable(&runner, &host, &s).await, None);
}

#[tokio::test]
async fn test_locate_skips_which_when_path_lookup_disabled() {
    let host = MockHost::new(&["/opt/tools/semgrep"]);
    let mut runner = ScriptedRunner::exiting(0, "");
    runner.which = Some("/opt/tools/semgrep".into());
    assert_eq!(locate_executable(&runner, &host, &settings()).await, None);
}

// ── Scan results ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scan_without_scanner_returns_install_help() {
    let host = MockHost::new(&[]);
    let runner = ScriptedRunner::exiting(0, "");
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ScanFailure::ToolNotFound));
    assert!(result.command.is_none());
    assert!(result.output.contains("Semgrep Security Scanner Analysis Report"));
    assert!(result.output.contains("Project directory: /work/App"));
    assert!(result.output.contains("pip install semgrep"));
    assert_eq!(runner.scan_calls.get(), 0);
}

#[tokio::test]
async fn test_scan_with_results_is_successful_and_detected() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::exiting(0, ONE_RESULT);
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert!(result.success);
    assert_eq!(result.return_code, Some(0));
    assert!(result.error.is_none());
    let summary = result.findings.expect("findings");
    assert!(summary.detected);
    assert!(summary.structured);
    assert_eq!(summary.findings.len(), 1);
    assert_eq!(summary.findings[0].rule_id, "swift.crypto.insecure-random");
    assert_eq!(summary.findings[0].line, Some(12));
    assert_eq!(summary.findings[0].severity.as_deref(), Some("WARNING"));
}

#[tokio::test]
async fn test_scan_builds_literal_command_line() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::exiting(0, NO_RESULTS);
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert_eq!(
        result.command.as_deref(),
        Some("/opt/homebrew/bin/semgrep scan --config=p/swift --config=p/secrets --json --verbose /work/App")
    );
    assert_eq!(
        *runner.seen_args.borrow(),
        vec!["scan", "--config=p/swift", "--config=p/secrets", "--json", "--verbose", "/work/App"]
    );
    assert_eq!(runner.seen_timeout.get(), Some(Duration::from_secs(300)));
}

#[tokio::test]
async fn test_scan_clean_report_is_not_detected() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::exiting(0, NO_RESULTS);
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert!(result.success);
    assert!(!result.findings.expect("findings").detected);
}

#[tokio::test]
async fn test_scan_nonzero_exit_is_not_successful() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::new(ScanBehaviour::Exit {
        code: 2,
        stdout: String::new(),
        stderr: "invalid configuration\n".into(),
    });
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert!(!result.success);
    assert!(result.error.is_none());
    assert_eq!(result.return_code, Some(2));
    assert!(result.output.contains("invalid configuration"));
}

#[tokio::test]
async fn test_scan_output_concatenates_stdout_then_stderr() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::new(ScanBehaviour::Exit {
        code: 0,
        stdout: "OUT\n".into(),
        stderr: "ERR\n".into(),
    });
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;
    assert_eq!(result.output, "OUT\nERR\n");
}

#[tokio::test]
async fn test_scan_timeout_reports_limit() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::new(ScanBehaviour::TimesOut);
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ScanFailure::TimedOut));
    assert_eq!(result.output, "Semgrep scan timed out after 5 minutes");
    assert!(result.command.is_some());
    assert!(result.return_code.is_none());
}

#[tokio::test]
async fn test_scan_spawn_failure_is_fault() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::new(ScanBehaviour::SpawnFails);
    let result = run_scan(&runner, &host, Path::new("/work/App"), &settings()).await;

    assert!(!result.success);
    assert!(matches!(result.error, Some(ScanFailure::Fault(_))));
    assert!(result.output.starts_with("Error running Semgrep: "));
}

// ── Working directory ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scan_runs_inside_target_and_restores_cwd() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::exiting(0, NO_RESULTS).tracking(&host);
    run_scan(&runner, &host, Path::new("/projects/App"), &settings()).await;

    assert_eq!(*runner.seen_cwd.borrow(), Some(PathBuf::from("/projects/App")));
    assert_eq!(host.cwd(), PathBuf::from("/work"));
}

#[tokio::test]
async fn test_scan_restores_cwd_after_timeout() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::new(ScanBehaviour::TimesOut).tracking(&host);
    run_scan(&runner, &host, Path::new("/projects/App"), &settings()).await;
    assert_eq!(host.cwd(), PathBuf::from("/work"));
}

#[tokio::test]
async fn test_scan_restores_cwd_after_fault() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::new(ScanBehaviour::SpawnFails).tracking(&host);
    run_scan(&runner, &host, Path::new("/projects/App"), &settings()).await;
    assert_eq!(host.cwd(), PathBuf::from("/work"));
}

#[tokio::test]
async fn test_scan_resolves_relative_target_before_entering_it() {
    let host = MockHost::new(&[SEMGREP]);
    let runner = ScriptedRunner::exiting(0, NO_RESULTS).tracking(&host);
    let result = run_scan(&runner, &host, Path::new("App"), &settings()).await;

    assert_eq!(*runner.seen_cwd.borrow(), Some(PathBuf::from("/work/App")));
    assert!(result.command.expect("command").ends_with(" /work/App"));
}

#[tokio::test]
async fn test_scan_unenterable_target_is_fault_without_running() {
    let mut host = MockHost::new(&[SEMGREP]);
    host.unenterable.push(PathBuf::from("/projects/Locked"));
    let runner = ScriptedRunner::exiting(0, NO_RESULTS);
    let result = run_scan(&runner, &host, Path::new("/projects/Locked"), &settings()).await;

    assert!(matches!(result.error, Some(ScanFailure::Fault(_))));
    assert!(result.output.contains("permission denied"));
    assert_eq!(runner.scan_calls.get(), 0);
    assert_eq!(host.cwd(), PathBuf::from("/work"));
}

#[tokio::test]
#[serial]
async fn test_scan_changes_real_process_directory() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let target = dir.path().canonicalize().expect("canonical");
    let exe = target.join("semgrep");
    std::fs::write(&exe, "#!/bin/sh\n").expect("write");
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    let before = std::env::current_dir().expect("cwd");
    let mut runner = ScriptedRunner::exiting(0, NO_RESULTS);
    runner.observe_process_cwd = true;
    let mut s = settings();
    s.candidates = vec![exe.display().to_string()];

    let result = run_scan(&runner, &LocalFs, &target, &s).await;

    assert!(result.success);
    assert_eq!(*runner.seen_cwd.borrow(), Some(target.clone()));
    assert_eq!(std::env::current_dir().expect("cwd"), before);
}

#[test]
#[serial]
fn test_workdir_guard_restores_on_drop() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let target = dir.path().canonicalize().expect("canonical");
    let before = std::env::current_dir().expect("cwd");
    {
        let _guard = WorkdirGuard::enter(&LocalFs, &target).expect("enter");
        assert_eq!(std::env::current_dir().expect("cwd"), target);
    }
    assert_eq!(std::env::current_dir().expect("cwd"), before);
}
