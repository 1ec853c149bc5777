//! Domain types and validators for iosdevops configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::pbxproj::{DEFAULT_PROJECT_FILE, DEFAULT_RESOURCES_PHASE_ID, is_object_id};
use crate::domain::scan::{DEFAULT_CANDIDATES, DEFAULT_RULE_PACKS, DEFAULT_SCAN_TIMEOUT};

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "scanner.rule_packs",
    "scanner.timeout_secs",
    "scanner.path_lookup",
    "project.file",
    "project.resources_phase_id",
];

pub const MAX_TIMEOUT_SECS: u64 = 3600;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.iosdevops/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolConfig {
    pub scanner: ScannerConfig,
    pub project: ProjectConfig,
}

/// Settings for `iosdevops scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Rule packs passed as `--config=<pack>`.
    pub rule_packs: Vec<String>,
    /// Wall-clock limit for one scan.
    pub timeout_secs: u64,
    /// Executable locations probed in order. `~/` expands to the home directory.
    pub candidates: Vec<String>,
    /// Fall back to `which semgrep` when no candidate matches.
    pub path_lookup: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rule_packs: DEFAULT_RULE_PACKS.iter().map(ToString::to_string).collect(),
            timeout_secs: DEFAULT_SCAN_TIMEOUT.as_secs(),
            candidates: DEFAULT_CANDIDATES.iter().map(ToString::to_string).collect(),
            path_lookup: true,
        }
    }
}

impl ScannerConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for `iosdevops add-resource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Path to `project.pbxproj`, relative to the working directory.
    pub file: String,
    /// Identifier of the resources build phase.
    pub resources_phase_id: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            file: DEFAULT_PROJECT_FILE.to_string(),
            resources_phase_id: DEFAULT_RESOURCES_PHASE_ID.to_string(),
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| -> anyhow::Error {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            valid: valid.to_string(),
        }
        .into()
    };
    match key {
        "scanner.rule_packs" => {
            if parse_rule_packs(value).is_empty() {
                return Err(invalid("comma-separated rule pack names, e.g. p/swift,p/secrets"));
            }
        }
        "scanner.timeout_secs" => match value.parse::<u64>() {
            Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => {}
            _ => return Err(invalid(&format!("1..={MAX_TIMEOUT_SECS}"))),
        },
        "scanner.path_lookup" => {
            if value != "true" && value != "false" {
                return Err(invalid("true, false"));
            }
        }
        "project.file" => {
            if value.trim().is_empty() {
                return Err(invalid("a non-empty path"));
            }
        }
        "project.resources_phase_id" => {
            if !is_object_id(value) {
                return Err(invalid("24 uppercase hexadecimal characters"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate `key`/`value` and store the value in `config`.
///
/// # Errors
///
/// Returns an error if the key is unknown or the value invalid.
pub fn set_config_value(config: &mut ToolConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;
    validate_config_value(key, value)?;
    match key {
        "scanner.rule_packs" => config.scanner.rule_packs = parse_rule_packs(value),
        "scanner.timeout_secs" => config.scanner.timeout_secs = value.parse()?,
        "scanner.path_lookup" => config.scanner.path_lookup = value == "true",
        "project.file" => config.project.file = value.to_string(),
        "project.resources_phase_id" => config.project.resources_phase_id = value.to_string(),
        _ => anyhow::bail!("Unknown setting: {key}"),
    }
    Ok(())
}

/// Check a loaded configuration with the same rules `config set` applies.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for the first field that fails.
pub fn validate_config(config: &ToolConfig) -> Result<()> {
    validate_config_value("scanner.rule_packs", &config.scanner.rule_packs.join(","))?;
    validate_config_value(
        "scanner.timeout_secs",
        &config.scanner.timeout_secs.to_string(),
    )?;
    validate_config_value("project.file", &config.project.file)?;
    validate_config_value(
        "project.resources_phase_id",
        &config.project.resources_phase_id,
    )?;
    Ok(())
}

fn parse_rule_packs(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
