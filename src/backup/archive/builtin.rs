use crate::backup::archive::{archive_root, ArchiveBuilder};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;

use bon::Builder;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, IntoInnerError, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Archives in-process with the `tar` crate
///
/// Members are visited in file name order, so an unchanged directory always
/// produces the same bytes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Builder, PartialEq, Eq, CopyGetters)]
#[serde(deny_unknown_fields)]
#[getset(get_copy = "pub")]
pub struct BuiltinArchiver {
    /// Store the target of symlinks instead of the links themselves
    #[serde(default)]
    #[builder(default)]
    follow_symlinks: bool,
}

impl ArchiveBuilder for BuiltinArchiver {
    fn build_archive(&self, project_dir: &Path, out: &Path) -> Result<()> {
        let (parent, basename) = archive_root(project_dir)?;
        let root = parent.join(&basename);
        if !root.is_dir() {
            return Err(Error::NotADirectory(project_dir.to_path_buf()));
        }
        tracing::debug!(
            project_dir = ?project_dir,
            parent_dir = ?parent,
            basename = ?basename,
            "Create archive"
        );

        let mut writer = tar::Builder::new(BufWriter::new(File::create(out)?));
        writer.follow_symlinks(self.follow_symlinks);

        let mut entry_count = 0;
        for entry in WalkDir::new(&root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
        {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| std::io::Error::other(e.to_string()))
                .map_err(Error::from)
                .with_msg(format!("Stripping {:?} from {:?} failed", root, entry.path()))?;
            let name = if relative.as_os_str().is_empty() {
                PathBuf::from(&basename)
            } else {
                Path::new(&basename).join(relative)
            };
            writer.append_path_with_name(entry.path(), name)?;
            entry_count += 1;
        }

        writer
            .into_inner()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .flush()?;

        tracing::debug!(archive = ?out, entries = entry_count, "Archive created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::checksum::fingerprint_file;
    use tempfile::TempDir;

    fn create_test_project(dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir.join("subdir"))?;
        std::fs::write(dir.join("file1.txt"), "content1")?;
        std::fs::write(dir.join("file2.json"), "content2")?;
        std::fs::write(dir.join("subdir/file3.txt"), "content3")?;
        Ok(())
    }

    fn member_names(archive: &Path) -> Vec<PathBuf> {
        let mut archive = tar::Archive::new(File::open(archive).unwrap());
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect()
    }

    #[test]
    fn test_members_are_relative_to_parent() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("proj");
        create_test_project(&project).unwrap();
        let out = temp_dir.path().join("proj.tar");

        BuiltinArchiver::default()
            .build_archive(&project, &out)
            .unwrap();

        let names = member_names(&out);
        assert_eq!(
            names,
            vec![
                PathBuf::from("proj"),
                PathBuf::from("proj/file1.txt"),
                PathBuf::from("proj/file2.json"),
                PathBuf::from("proj/subdir"),
                PathBuf::from("proj/subdir/file3.txt"),
            ]
        );
    }

    #[test]
    fn test_unchanged_directory_is_reproducible() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("proj");
        create_test_project(&project).unwrap();
        let first = temp_dir.path().join("first.tar");
        let second = temp_dir.path().join("second.tar");

        let archiver = BuiltinArchiver::default();
        archiver.build_archive(&project, &first).unwrap();
        archiver.build_archive(&project, &second).unwrap();

        assert_eq!(
            fingerprint_file(&first).unwrap(),
            fingerprint_file(&second).unwrap()
        );
    }

    #[test]
    fn test_added_file_changes_archive() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("proj");
        create_test_project(&project).unwrap();
        let first = temp_dir.path().join("first.tar");
        let second = temp_dir.path().join("second.tar");

        let archiver = BuiltinArchiver::default();
        archiver.build_archive(&project, &first).unwrap();
        std::fs::write(project.join("new.txt"), "new").unwrap();
        archiver.build_archive(&project, &second).unwrap();

        assert_ne!(
            fingerprint_file(&first).unwrap(),
            fingerprint_file(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("missing.tar");

        let err = BuiltinArchiver::default()
            .build_archive(&temp_dir.path().join("missing"), &out)
            .unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_stored_as_link() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("proj");
        create_test_project(&project).unwrap();
        std::os::unix::fs::symlink("file1.txt", project.join("link")).unwrap();
        let out = temp_dir.path().join("proj.tar");

        BuiltinArchiver::default()
            .build_archive(&project, &out)
            .unwrap();

        let mut archive = tar::Archive::new(File::open(&out).unwrap());
        let link = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .find(|e| e.path().unwrap() == Path::new("proj/link"))
            .unwrap();
        assert_eq!(link.header().entry_type(), tar::EntryType::Symlink);
    }
}
