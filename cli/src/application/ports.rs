//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::ToolConfig;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout the error is a `RunnerError::TimedOut` and the child process
    /// must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Host Ports ────────────────────────────────────────────────────────────────

/// Answers questions about executables on the host.
pub trait ExecutableProbe {
    /// `true` if `path` is a regular file with an execute permission bit set.
    fn is_executable(&self, path: &Path) -> bool;
    /// The user's home directory, used to expand `~/` candidates.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// The process working directory. Changes are process-wide.
pub trait WorkingDir {
    fn current_dir(&self) -> Result<PathBuf>;
    fn set_current_dir(&self, path: &Path) -> Result<()>;
    /// Absolute form of `path` with symlinks resolved.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

/// Plain file access for the manifest patcher.
pub trait FileStore {
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, returning defaults when no file exists.
    fn load(&self) -> Result<ToolConfig>;
    /// Persist the configuration.
    fn save(&self, config: &ToolConfig) -> Result<()>;
    /// Location of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
