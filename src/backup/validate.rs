//! Validation functions for configuration values.
//!
//! Provides custom `validator` functions plus the directory checks the
//! orchestrator runs before any backup task starts.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use validator::ValidationError;

use std::path::Path;

pub fn validate_non_empty_path<P: AsRef<Path>>(path: P) -> std::result::Result<(), ValidationError> {
    if path.as_ref().as_os_str().is_empty() {
        return Err(ValidationError::new("EmptyPath")
            .with_message("Backup directory must be specified.".into()));
    }

    Ok(())
}

pub fn directory_exists<P: AsRef<Path>>(dir: P) -> bool {
    std::fs::metadata(dir).map(|md| md.is_dir()).unwrap_or(false)
}

/// Ensures `dir` is a directory, creating it and its parents when it is missing.
pub fn ensure_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir.to_path_buf()));
        }
    } else {
        tracing::info!(backup_dir = ?dir, "Backup directory does not exist, creating it");
        return std::fs::create_dir_all(dir)
            .map_err(Error::from)
            .with_msg(format!("Unable to create backup directory {:?}", dir));
    }

    Ok(())
}
