//! Application service: register a bundled resource in an Xcode project.
//!
//! Split into prepare / write so the caller can render the outcome and ask
//! for confirmation before the manifest is overwritten.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{FileStore, ProgressReporter};
use crate::domain::error::ManifestError;
use crate::domain::pbxproj::{self, IdAllocator, PatchOutcome, ResourceSpec};

/// Read `manifest` and compute the patched text. Nothing is written.
///
/// # Errors
///
/// Returns `ManifestError::NotFound` if the manifest does not exist, or an
/// I/O error if it cannot be read.
pub fn prepare(
    fs: &impl FileStore,
    reporter: &impl ProgressReporter,
    manifest: &Path,
    spec: &ResourceSpec,
) -> Result<PatchOutcome> {
    if !fs.exists(manifest) {
        return Err(ManifestError::NotFound(manifest.to_path_buf()).into());
    }
    let content = fs.read_to_string(manifest)?;

    if pbxproj::references_name(&content, &spec.name) {
        reporter.warn(&format!(
            "Project already references '{}'; entries will be duplicated",
            spec.name
        ));
    }

    let ids = IdAllocator::from_manifest(&content).object_ids();
    tracing::debug!(
        group = %ids.group,
        file = %ids.file,
        build_file = %ids.build_file,
        "allocated object ids"
    );

    let outcome = pbxproj::patch(&content, spec, &ids);
    for step in &outcome.applied {
        reporter.step(&format!("Added {}", step.label()));
    }
    for step in &outcome.missed {
        reporter.warn(&format!("Could not add {}: anchor not found", step.label()));
    }
    Ok(outcome)
}

/// Fail unless every insertion landed.
///
/// # Errors
///
/// Returns `ManifestError::Incomplete` listing the missed insertions.
pub fn require_complete(outcome: &PatchOutcome, manifest: &Path) -> Result<()> {
    if outcome.is_complete() {
        return Ok(());
    }
    let missed = outcome
        .missed
        .iter()
        .map(|step| step.label())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ManifestError::Incomplete {
        path: manifest.to_path_buf(),
        missed,
    }
    .into())
}

/// Overwrite `manifest` with the patched text.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write(
    fs: &impl FileStore,
    reporter: &impl ProgressReporter,
    manifest: &Path,
    outcome: &PatchOutcome,
) -> Result<()> {
    fs.write(manifest, &outcome.text)
        .with_context(|| format!("updating {}", manifest.display()))?;
    reporter.success(&format!("Updated {}", manifest.display()));
    Ok(())
}
