//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Scan errors ───────────────────────────────────────────────────────────────

/// Errors that stop the `scan` command before the scanner is invoked.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Project path does not exist: {}", .0.display())]
    TargetMissing(PathBuf),
}

// ── Process runner errors ─────────────────────────────────────────────────────

/// Errors raised by `CommandRunner` implementations that callers need to
/// tell apart from generic I/O faults.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{program} timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },
}

// ── Manifest errors ───────────────────────────────────────────────────────────

/// Errors related to patching an Xcode project manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Project file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Project file left unchanged: {} did not match ({missed})", .path.display())]
    Incomplete { path: PathBuf, missed: String },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
