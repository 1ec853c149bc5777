//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod pbxproj;
pub mod scan;

pub use config::{
    ToolConfig, set_config_value, validate_config, validate_config_key, validate_config_value,
};
pub use error::{ConfigError, ManifestError, RunnerError, ScanError};
pub use pbxproj::{IdAllocator, Insertion, ObjectIds, PatchOutcome, ResourceSpec};
pub use scan::{Finding, FindingsSummary, ScanFailure, ScanResult};
