//! `iosdevops add-resource`: register a bundled file in the Xcode project.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::{config_service, manifest_patch};
use crate::domain::pbxproj::{
    DEFAULT_FILE_TYPE, DEFAULT_GROUP_NAME, DEFAULT_RESOURCE_NAME, PatchOutcome, ResourceSpec,
    is_annotation_safe, is_object_id,
};
use crate::output::{SilentReporter, TerminalReporter};

/// Arguments for the add-resource command.
#[derive(Args)]
pub struct AddResourceArgs {
    /// Path to project.pbxproj (defaults to the configured project file)
    #[arg(long, value_name = "PATH")]
    pub project: Option<PathBuf>,

    /// Resource file name
    #[arg(long, default_value = DEFAULT_RESOURCE_NAME, value_parser = parse_label)]
    pub name: String,

    /// Group (folder) holding the resource
    #[arg(long, default_value = DEFAULT_GROUP_NAME, value_parser = parse_label)]
    pub group: String,

    /// Value for lastKnownFileType
    #[arg(long, default_value = DEFAULT_FILE_TYPE, value_parser = parse_label)]
    pub file_type: String,

    /// Identifier of the resources build phase (defaults to the configured id)
    #[arg(long, value_name = "ID", value_parser = parse_object_id)]
    pub phase_id: Option<String>,

    /// Show what would change without writing the project file
    #[arg(long)]
    pub dry_run: bool,

    /// Refuse to write unless every entry can be added
    #[arg(long)]
    pub strict: bool,
}

fn parse_label(s: &str) -> Result<String, String> {
    if is_annotation_safe(s) {
        Ok(s.to_string())
    } else {
        Err("must be non-empty, on one line, and free of `/*` and `*/`".to_string())
    }
}

fn parse_object_id(s: &str) -> Result<String, String> {
    if is_object_id(s) {
        Ok(s.to_string())
    } else {
        Err("expected 24 uppercase hexadecimal characters".to_string())
    }
}

/// Run the add-resource command.
///
/// # Errors
///
/// Returns an error if the project file is missing or unreadable, if
/// `--strict` is set and an entry could not be placed, or if writing fails.
pub fn run(app: &AppContext, args: &AddResourceArgs) -> Result<ExitCode> {
    let config = config_service::load_config(&app.config_store)?;
    let manifest = args
        .project
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.project.file));
    let spec = ResourceSpec {
        name: args.name.clone(),
        group: args.group.clone(),
        file_type: args.file_type.clone(),
        phase_id: args
            .phase_id
            .clone()
            .unwrap_or(config.project.resources_phase_id),
    };

    let (outcome, written) = if app.is_json() {
        apply(app, &SilentReporter, &manifest, &spec, args)?
    } else {
        app.output.header(&format!(
            "Adding {}/{} to {}",
            spec.group,
            spec.name,
            manifest.display()
        ));
        apply(app, &TerminalReporter::new(&app.output), &manifest, &spec, args)?
    };

    app.renderer().render_patch(&manifest, &outcome, written)?;
    Ok(ExitCode::SUCCESS)
}

fn apply(
    app: &AppContext,
    reporter: &impl ProgressReporter,
    manifest: &Path,
    spec: &ResourceSpec,
    args: &AddResourceArgs,
) -> Result<(PatchOutcome, bool)> {
    let outcome = manifest_patch::prepare(&app.fs, reporter, manifest, spec)?;
    if args.strict {
        manifest_patch::require_complete(&outcome, manifest)?;
    }
    if args.dry_run {
        return Ok((outcome, false));
    }
    if !app.confirm(&format!("Write changes to {}?", manifest.display()), true)? {
        return Ok((outcome, false));
    }
    manifest_patch::write(&app.fs, reporter, manifest, &outcome)?;
    Ok((outcome, true))
}
