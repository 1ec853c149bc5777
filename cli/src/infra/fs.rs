//! Filesystem infrastructure: executable probing, the process working
//! directory, and manifest file access.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::{ExecutableProbe, FileStore, WorkingDir};

/// Production filesystem implementation of the host ports.
pub struct LocalFs;

impl ExecutableProbe for LocalFs {
    fn is_executable(&self, path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

impl WorkingDir for LocalFs {
    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir().context("reading current directory")
    }

    fn set_current_dir(&self, path: &Path) -> Result<()> {
        std::env::set_current_dir(path)
            .with_context(|| format!("changing directory to {}", path.display()))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        std::fs::canonicalize(path).with_context(|| format!("resolving {}", path.display()))
    }
}

impl FileStore for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading file {}", path.display()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))
    }
}
