//! Integration tests for `iosdevops scan`.
//!
//! Each test points `IOSDEVOPS_CONFIG` at a temp file whose candidate list
//! holds either nothing or a shell script standing in for Semgrep.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use predicates::prelude::*;

use crate::helpers::{iosdevops, sandbox, write_scanner_config};

#[test]
fn test_scan_missing_target_exits_one() {
    let (dir, config) = sandbox();
    iosdevops(&config)
        .arg("scan")
        .arg(dir.path().join("does-not-exist"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Project path does not exist"));
}

#[test]
fn test_scan_missing_target_json_error_code() {
    let (dir, config) = sandbox();
    let out = iosdevops(&config)
        .args(["scan", "--json"])
        .arg(dir.path().join("does-not-exist"))
        .output()
        .expect("run");
    assert_eq!(out.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(v["error"], true);
    assert_eq!(v["code"], "TARGET_NOT_FOUND");
}

#[test]
fn test_scan_without_scanner_prints_install_help_and_exits_zero() {
    let (dir, config) = sandbox();
    write_scanner_config(&config, &[]);
    iosdevops(&config)
        .arg("scan")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Running Semgrep Security Scan"))
        .stdout(predicate::str::contains("Semgrep Security Scanner Analysis Report"))
        .stdout(predicate::str::contains("brew install semgrep"))
        .stdout(predicate::str::contains("End of Semgrep Scan Report"))
        .stdout(predicate::str::contains("Scan failed or found issues"))
        .stderr(predicate::str::contains("Scan failed").not());
}

#[test]
fn test_scan_without_scanner_json_reports_tool_not_found() {
    let (dir, config) = sandbox();
    write_scanner_config(&config, &[]);
    let out = iosdevops(&config)
        .args(["scan", "--json"])
        .arg(dir.path())
        .output()
        .expect("run");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(v["success"], false);
    assert_eq!(v["error"]["kind"], "tool_not_found");
    assert!(v.get("command").is_none());
}

#[test]
fn test_scan_rejects_hand_edited_zero_timeout() {
    let (dir, config) = sandbox();
    std::fs::write(&config, "scanner:\n  timeout_secs: 0\n").expect("write config");
    let out = iosdevops(&config)
        .args(["scan", "--json"])
        .arg(dir.path())
        .output()
        .expect("run");
    assert_eq!(out.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(v["code"], "INVALID_CONFIG");
    assert!(v["message"].as_str().unwrap().contains("scanner.timeout_secs"));
}

#[cfg(unix)]
mod with_fake_scanner {
    use super::*;
    use crate::helpers::fake_scanner;

    const REPORT: &str = r#"{"results":[{"check_id":"swift.secrets.hardcoded-key","path":"App/Keys.swift","start":{"line":7},"extra":{"severity":"ERROR"}}],"errors":[]}"#;

    #[test]
    fn test_scan_reports_findings() {
        let (dir, config) = sandbox();
        let tools = tempfile::TempDir::new().expect("tools dir");
        let exe = fake_scanner(tools.path(), &format!("echo '{REPORT}'"));
        write_scanner_config(&config, &[&exe]);

        iosdevops(&config)
            .arg("scan")
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Scan completed successfully"))
            .stdout(predicate::str::contains("Security issues found! (1 result)"))
            .stdout(predicate::str::contains("swift.secrets.hardcoded-key"))
            .stdout(predicate::str::contains("App/Keys.swift:7"));
    }

    #[test]
    fn test_scan_clean_report() {
        let (dir, config) = sandbox();
        let tools = tempfile::TempDir::new().expect("tools dir");
        let exe = fake_scanner(tools.path(), r#"echo '{"results":[],"errors":[]}'"#);
        write_scanner_config(&config, &[&exe]);

        iosdevops(&config)
            .arg("scan")
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("No security issues found!"));
    }

    #[test]
    fn test_scan_passes_rule_packs_and_runs_inside_target() {
        let (dir, config) = sandbox();
        let tools = tempfile::TempDir::new().expect("tools dir");
        let exe = fake_scanner(tools.path(), r#"echo "args=$*"; echo "cwd=$(pwd -P)""#);
        write_scanner_config(&config, &[&exe]);
        let target = dir.path().canonicalize().expect("canonical");

        iosdevops(&config)
            .args(["scan", "--rule-pack", "p/ci"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains(format!(
                "args=scan --config=p/ci --json --verbose {}",
                target.display()
            )))
            .stdout(predicate::str::contains(format!("cwd={}", target.display())));
    }

    #[test]
    fn test_scan_nonzero_exit_is_reported_but_exits_zero() {
        let (dir, config) = sandbox();
        let tools = tempfile::TempDir::new().expect("tools dir");
        let exe = fake_scanner(tools.path(), "echo 'bad rule pack' >&2; exit 2");
        write_scanner_config(&config, &[&exe]);

        iosdevops(&config)
            .arg("scan")
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("bad rule pack"))
            .stdout(predicate::str::contains("Semgrep exited with status 2"))
            .stdout(predicate::str::contains("Scan failed or found issues"));
    }

    #[test]
    fn test_scan_times_out() {
        let (dir, config) = sandbox();
        let tools = tempfile::TempDir::new().expect("tools dir");
        let exe = fake_scanner(tools.path(), "exec sleep 30");
        write_scanner_config(&config, &[&exe]);

        iosdevops(&config)
            .args(["scan", "--timeout", "1"])
            .arg(dir.path())
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .success()
            .stdout(predicate::str::contains("Semgrep scan timed out after 1 second"))
            .stdout(predicate::str::contains("Reason: Scan timed out"));
    }

    #[test]
    fn test_scan_json_document() {
        let (dir, config) = sandbox();
        let tools = tempfile::TempDir::new().expect("tools dir");
        let exe = fake_scanner(tools.path(), &format!("echo '{REPORT}'"));
        write_scanner_config(&config, &[&exe]);

        let out = iosdevops(&config)
            .args(["scan", "--json"])
            .arg(dir.path())
            .output()
            .expect("run");
        assert!(out.status.success());
        let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
        assert_eq!(v["success"], true);
        assert_eq!(v["return_code"], 0);
        assert_eq!(v["findings"]["detected"], true);
        assert_eq!(v["findings"]["findings"][0]["rule_id"], "swift.secrets.hardcoded-key");
        assert!(v["command"].as_str().unwrap().contains("--config=p/swift"));
    }
}
