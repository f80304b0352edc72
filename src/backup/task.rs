//! Backup of a single project directory.
//!
//! A task builds a candidate archive in the scratch area, fingerprints it and the
//! committed archive (if any), and renames the candidate over the committed one only
//! when their content differs. Every failure stays inside the task and ends it in
//! [`TaskOutcome::Failed`].

use crate::backup::archive::ArchiveBuilder;
use crate::backup::checksum::{fingerprint_file, incumbent_fingerprint, Fingerprint};
use crate::backup::naming::archive_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::directory_exists;

use bon::Builder;
use derive_more::Display;
use getset::Getters;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum TaskState {
    Pending,
    Building,
    Fingerprinting,
    Deciding,
    Committed,
    Skipped,
    Failed,
}

#[derive(Debug, Display)]
pub enum TaskOutcome {
    /// Candidate replaced (or became) the destination archive
    #[display("committed {archive:?} ({fingerprint})")]
    Committed {
        archive: PathBuf,
        fingerprint: Fingerprint,
    },
    /// Candidate had the same content as the destination archive
    #[display("skipped {archive:?} ({fingerprint})")]
    Skipped {
        archive: PathBuf,
        fingerprint: Fingerprint,
    },
    #[display("failed: {_0}")]
    Failed(Error),
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Committed { .. } => TaskState::Committed,
            TaskOutcome::Skipped { .. } => TaskState::Skipped,
            TaskOutcome::Failed(_) => TaskState::Failed,
        }
    }
}

#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct BackupTask {
    #[builder(into)]
    project_dir: PathBuf,
    #[builder(into)]
    backup_dir: PathBuf,
    #[builder(into)]
    scratch_dir: PathBuf,
}

impl BackupTask {
    /// Destination of the committed archive.
    pub fn archive(&self) -> PathBuf {
        archive_path(&self.backup_dir, &self.project_dir)
    }

    /// Where the candidate archive is built.
    pub fn candidate(&self) -> PathBuf {
        archive_path(&self.scratch_dir, &self.project_dir)
    }

    /// Runs the task to a terminal state.
    pub fn execute<A: ArchiveBuilder + ?Sized>(&self, archiver: &A) -> TaskOutcome {
        let _span = tracing::info_span!("backup_task", project_dir = ?self.project_dir).entered();
        self.transition(TaskState::Pending);

        let outcome = match self.try_execute(archiver) {
            Ok(outcome) => outcome,
            Err(e) => TaskOutcome::Failed(e),
        };
        match &outcome {
            TaskOutcome::Committed { archive, .. } => {
                tracing::info!(filename = ?archive, "Backup file created")
            }
            TaskOutcome::Skipped {
                archive,
                fingerprint,
            } => tracing::info!(
                new_archive = ?self.candidate(),
                previous_archive = ?archive,
                checksum = %fingerprint,
                "New archive is not created, content unchanged"
            ),
            TaskOutcome::Failed(Error::NotADirectory(_)) => tracing::warn!(
                project_dir = ?self.project_dir,
                "Project directory not found"
            ),
            TaskOutcome::Failed(e) => tracing::error!(error = %e, "Backup failed"),
        }
        self.transition(outcome.state());
        outcome
    }

    fn try_execute<A: ArchiveBuilder + ?Sized>(&self, archiver: &A) -> Result<TaskOutcome> {
        if !directory_exists(&self.project_dir) {
            return Err(Error::NotADirectory(self.project_dir.clone()));
        }

        let candidate = self.candidate();
        self.transition(TaskState::Building);
        archiver
            .build_archive(&self.project_dir, &candidate)
            .with_msg(format!("Unable to archive: {:?}", self.project_dir))?;

        self.transition(TaskState::Fingerprinting);
        let fingerprint = fingerprint_file(&candidate)?;
        let archive = self.archive();
        let incumbent = incumbent_fingerprint(&archive)?;
        tracing::debug!(
            candidate = ?candidate,
            checksum = %fingerprint,
            archive = ?archive,
            previous_checksum = %incumbent,
            "Calculated checksums"
        );

        self.transition(TaskState::Deciding);
        if incumbent.matches(&fingerprint) {
            return Ok(TaskOutcome::Skipped {
                archive,
                fingerprint,
            });
        }

        commit(&candidate, &archive)?;
        Ok(TaskOutcome::Committed {
            archive,
            fingerprint,
        })
    }

    fn transition(&self, state: TaskState) {
        tracing::debug!(state = %state, "Task state");
    }
}

/// Atomically replaces `archive` with `candidate`; both must be on the same volume.
fn commit(candidate: &Path, archive: &Path) -> Result<()> {
    std::fs::rename(candidate, archive)
        .map_err(Error::from)
        .with_msg(format!(
            "Failed to move archive from {:?} to {:?}",
            candidate, archive
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::builtin::BuiltinArchiver;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        project: PathBuf,
        backup_dir: PathBuf,
        scratch_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let project = root.path().join("proj");
            std::fs::create_dir_all(project.join("src")).unwrap();
            std::fs::write(project.join("src/lib.rs"), "pub fn f() {}").unwrap();
            let backup_dir = root.path().join("backups");
            std::fs::create_dir(&backup_dir).unwrap();
            Self {
                project,
                backup_dir,
                scratch_dir: root.path().to_path_buf(),
                _root: root,
            }
        }

        fn task(&self) -> BackupTask {
            // every run gets a fresh scratch directory, like the orchestrator does
            let scratch = tempfile::tempdir_in(&self.scratch_dir).unwrap().keep();
            BackupTask::builder()
                .project_dir(&self.project)
                .backup_dir(&self.backup_dir)
                .scratch_dir(scratch)
                .build()
        }
    }

    #[test]
    fn test_first_run_commits() {
        let fx = Fixture::new();
        let task = fx.task();

        let outcome = task.execute(&BuiltinArchiver::default());

        assert_eq!(outcome.state(), TaskState::Committed);
        assert!(task.archive().is_file());
        assert!(!task.candidate().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unchanged_second_run_skips_without_touching_archive() {
        use std::os::unix::fs::MetadataExt;

        let fx = Fixture::new();
        let archiver = BuiltinArchiver::default();
        let first = fx.task();
        assert_eq!(first.execute(&archiver).state(), TaskState::Committed);
        let inode_before = std::fs::metadata(first.archive()).unwrap().ino();

        let second = fx.task();
        let outcome = second.execute(&archiver);

        assert_eq!(outcome.state(), TaskState::Skipped);
        assert_eq!(std::fs::metadata(second.archive()).unwrap().ino(), inode_before);
        assert!(second.candidate().is_file());
    }

    #[test]
    fn test_changed_content_recommits() {
        let fx = Fixture::new();
        let archiver = BuiltinArchiver::default();
        let first = fx.task();
        first.execute(&archiver);
        let before = fingerprint_file(first.archive()).unwrap();

        std::fs::write(fx.project.join("README.md"), "docs").unwrap();
        let second = fx.task();
        let outcome = second.execute(&archiver);

        assert_eq!(outcome.state(), TaskState::Committed);
        let after = fingerprint_file(second.archive()).unwrap();
        assert_ne!(before, after);
        match outcome {
            TaskOutcome::Committed { fingerprint, .. } => assert_eq!(fingerprint, after),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_missing_project_fails_without_archiving() {
        let fx = Fixture::new();
        let task = BackupTask::builder()
            .project_dir(fx.project.join("missing"))
            .backup_dir(&fx.backup_dir)
            .scratch_dir(&fx.scratch_dir)
            .build();

        let outcome = task.execute(&BuiltinArchiver::default());

        assert!(matches!(outcome, TaskOutcome::Failed(Error::NotADirectory(_))));
        assert!(!task.candidate().exists());
        assert_eq!(std::fs::read_dir(&fx.backup_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_incumbent_fails_and_is_kept() {
        let fx = Fixture::new();
        let task = fx.task();
        std::fs::create_dir(task.archive()).unwrap();

        let outcome = task.execute(&BuiltinArchiver::default());

        assert_eq!(outcome.state(), TaskState::Failed);
        assert!(task.archive().is_dir());
    }

    #[test]
    fn test_archiver_failure_fails_task() {
        struct FailingArchiver;
        impl ArchiveBuilder for FailingArchiver {
            fn build_archive(&self, _: &Path, _: &Path) -> Result<()> {
                Err(std::io::Error::other("disk full").into())
            }
        }

        let fx = Fixture::new();
        let task = fx.task();
        let outcome = task.execute(&FailingArchiver);

        match outcome {
            TaskOutcome::Failed(e) => assert!(e.to_string().contains("disk full")),
            _ => panic!("Expected failed outcome"),
        }
        assert!(!task.archive().exists());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_project_logs_warning() {
        let fx = Fixture::new();
        let task = BackupTask::builder()
            .project_dir(fx.project.join("missing"))
            .backup_dir(&fx.backup_dir)
            .scratch_dir(&fx.scratch_dir)
            .build();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = crate::logging::subscriber(false, move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            task.execute(&BuiltinArchiver::default());
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Project directory not found"));
        assert!(!logs.contains("Task state"));
    }

    #[test]
    fn test_debug_logging_traces_states() {
        let fx = Fixture::new();
        let task = fx.task();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = crate::logging::subscriber(true, move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            task.execute(&BuiltinArchiver::default());
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        for state in ["Pending", "Building", "Fingerprinting", "Deciding", "Committed"] {
            assert!(logs.contains(&format!("state={state}")), "missing {state}");
        }
        assert!(logs.contains("Backup file created"));
    }
}
