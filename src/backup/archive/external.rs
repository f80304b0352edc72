use crate::backup::archive::{archive_root, ArchiveBuilder};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;

use bon::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Archives with an external `tar`-compatible executable
///
/// Runs `<program> cf <out> -C <parent> <basename>`.
#[derive(Clone, Debug, Serialize, Deserialize, Builder, PartialEq, Eq, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct ExternalArchiver {
    #[serde(default = "default_program")]
    #[builder(default = default_program(), into)]
    program: PathBuf,
}

fn default_program() -> PathBuf {
    PathBuf::from("tar")
}

impl Default for ExternalArchiver {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ArchiveBuilder for ExternalArchiver {
    fn build_archive(&self, project_dir: &Path, out: &Path) -> Result<()> {
        let (parent, basename) = archive_root(project_dir)?;
        tracing::debug!(
            project_dir = ?project_dir,
            parent_dir = ?parent,
            basename = ?basename,
            program = ?self.program,
            "Create archive"
        );

        let output = Command::new(&self.program)
            .arg("cf")
            .arg(out)
            .arg("-C")
            .arg(&parent)
            .arg(&basename)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| Error::ArchiverSpawn {
                program: self.program.clone(),
                error,
            })?;

        if !output.status.success() {
            return Err(Error::ArchiverFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        tracing::debug!(archive = ?out, "Archive created");
        Ok(())
    }
}

/// Whether a `tar` executable can be run on this machine.
#[cfg(test)]
pub(crate) fn tar_available() -> bool {
    Command::new("tar")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
