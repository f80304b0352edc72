pub mod builtin;
pub mod external;

use crate::backup::archive::builtin::BuiltinArchiver;
use crate::backup::archive::external::ExternalArchiver;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// How candidate archives are produced
///
/// - External: delegate to a `tar` executable, the archive is whatever it writes
/// - Builtin: write the tar stream in-process with a stable member order
#[derive(Clone, From, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum ArchiverConfig {
    External(ExternalArchiver),
    Builtin(BuiltinArchiver),
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        ExternalArchiver::default().into()
    }
}

/// Builds one archive holding a whole project directory
///
/// Members are named relative to the directory's parent, so the archive of
/// `/home/u/proj` contains `proj/...` no matter where it lives on disk.
pub trait ArchiveBuilder {
    /// Writes the archive of `project_dir` to `out`.
    ///
    /// On error nothing usable is left at `out`.
    fn build_archive(&self, project_dir: &Path, out: &Path) -> Result<()>;
}

impl ArchiveBuilder for ArchiverConfig {
    fn build_archive(&self, project_dir: &Path, out: &Path) -> Result<()> {
        match self {
            ArchiverConfig::External(a) => a.build_archive(project_dir, out),
            ArchiverConfig::Builtin(a) => a.build_archive(project_dir, out),
        }
        .map_err(|e| {
            if let Err(remove_err) = std::fs::remove_file(out) {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(archive = ?out, error = %remove_err, "Unable to remove partial archive");
                }
            }
            e
        })
        .with_debug_object_and_fn_name(self.clone(), "build_archive")
    }
}

/// Splits a project directory into the directory the archiver runs from and the
/// single member it archives.
///
/// Paths without a final component (`.`, `..`, `/`) are canonicalized first.
pub fn archive_root(project_dir: &Path) -> Result<(PathBuf, OsString)> {
    let resolved;
    let project_dir = match project_dir.file_name() {
        Some(_) => project_dir,
        None => {
            resolved = project_dir.canonicalize()?;
            resolved.as_path()
        }
    };

    let basename = project_dir
        .file_name()
        .ok_or_else(|| Error::NotADirectory(project_dir.to_path_buf()))?
        .to_os_string();
    let parent = match project_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((parent, basename))
}
