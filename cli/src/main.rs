//! iosdevops - security scanning and project maintenance for iOS codebases

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use iosdevops_cli::cli::Cli;
use iosdevops_cli::domain::error::{ConfigError, ManifestError, ScanError};
use iosdevops_cli::output::json::format_error;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("IOSDEVOPS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json {
                match format_error(&format!("{e:#}"), error_code(&e)) {
                    Ok(body) => println!("{body}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn error_code(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<ScanError>().is_some() {
        "TARGET_NOT_FOUND"
    } else if let Some(e) = err.downcast_ref::<ManifestError>() {
        match e {
            ManifestError::NotFound(_) => "MANIFEST_NOT_FOUND",
            ManifestError::Incomplete { .. } => "MANIFEST_INCOMPLETE",
        }
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "INVALID_CONFIG"
    } else {
        "ERROR"
    }
}
