//! Mapping from a project directory to the archive file name it is stored under.
//!
//! The mapping is the only on-disk contract of the tool: every path separator in the
//! project path (exactly as given on the command line) becomes [`SEPARATOR_REPLACEMENT`]
//! and [`ARCHIVE_EXT`] is appended. The same project path always lands on the same file.
//! On unix the substitution works on the raw bytes of the path, so names that are not
//! valid UTF-8 are kept as they are.
//!
//! The mapping is not injective (`a:b` and `a/b` give the same name); the orchestrator
//! refuses the later of two projects whose names collide.

use std::ffi::OsString;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

pub static ARCHIVE_EXT: &str = "tar";
pub static SEPARATOR_REPLACEMENT: char = ':';

#[cfg(unix)]
pub fn archive_file_name<P: AsRef<Path>>(project_dir: P) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let mut name: Vec<u8> = project_dir
        .as_ref()
        .as_os_str()
        .as_bytes()
        .iter()
        .map(|&b| {
            if b == MAIN_SEPARATOR as u8 {
                SEPARATOR_REPLACEMENT as u8
            } else {
                b
            }
        })
        .collect();
    name.push(b'.');
    name.extend_from_slice(ARCHIVE_EXT.as_bytes());
    OsString::from_vec(name)
}

#[cfg(not(unix))]
pub fn archive_file_name<P: AsRef<Path>>(project_dir: P) -> OsString {
    let escaped = project_dir
        .as_ref()
        .to_string_lossy()
        .replace(MAIN_SEPARATOR, &SEPARATOR_REPLACEMENT.to_string());
    format!("{escaped}.{ARCHIVE_EXT}").into()
}

/// Where the archive for `project_dir` lives inside `dir`.
pub fn archive_path<P1: AsRef<Path>, P2: AsRef<Path>>(dir: P1, project_dir: P2) -> PathBuf {
    dir.as_ref().join(archive_file_name(project_dir))
}
