pub mod logging;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use which::which;

use crate::errors::AppError;

/// Finds an executable in the system PATH. Paths containing a separator are checked as given.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    which(name).with_context(|| {
        format!(
            "{} executable not found in PATH. Please ensure it is installed and in your PATH.",
            name
        )
    })
}

/// Creates `path` and any missing parents. An existing directory is left untouched.
pub fn ensure_directory(path: &Path) -> Result<(), AppError> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|source| AppError::Destination {
        path: path.to_path_buf(),
        source,
    })
}
