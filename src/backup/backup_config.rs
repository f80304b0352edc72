use crate::backup::archive::ArchiverConfig;
use crate::backup::naming::archive_file_name;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::task::{BackupTask, TaskOutcome, TaskState};
use crate::backup::validate::{ensure_dir_exist_or_created, validate_non_empty_path};
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use validator::Validate;

static SCRATCH_DIR_PREFIX: &str = ".backup-projects";

#[skip_serializing_none]
#[derive(Clone, Default, Serialize, Deserialize, Debug, Validate, Builder, PartialEq, Eq, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[serde(default)]
    #[builder(default, into)]
    #[validate(length(min = 1, message = "Projects dirs must be specified."))]
    project_dirs: Vec<PathBuf>,
    #[serde(default)]
    #[builder(default, into)]
    #[validate(custom(function = validate_non_empty_path))]
    backup_to: PathBuf,
    #[serde(default)]
    #[builder(default, into)]
    archiver: ArchiverConfig,
    #[validate(range(min = 1))]
    jobs: Option<usize>,
}

/// Terminal state of every task of one run, in input order
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(PathBuf, TaskOutcome)>,
}

impl RunReport {
    pub fn count(&self, state: TaskState) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.state() == state)
            .count()
    }
}

impl BackupConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, BackupConfig>(f).map_err(Error::from))
            .with_msg(format!("Parse YAML config failed: {:?}", path))
    }

    /// Returns a copy with `extra` project dirs appended and any given override applied.
    pub fn merged(
        mut self,
        extra: Vec<PathBuf>,
        backup_to: Option<PathBuf>,
        archiver: Option<ArchiverConfig>,
        jobs: Option<usize>,
    ) -> Self {
        self.project_dirs.extend(extra);
        if let Some(backup_to) = backup_to {
            self.backup_to = backup_to;
        }
        if let Some(archiver) = archiver {
            self.archiver = archiver;
        }
        if jobs.is_some() {
            self.jobs = jobs;
        }
        self
    }

    /// Project dirs with repeated paths removed, first occurrence wins.
    pub fn unique_project_dirs(&self) -> Vec<PathBuf> {
        self.project_dirs.iter().unique().cloned().collect()
    }

    /// Pairs every unique project dir with the archive name it may use.
    ///
    /// A dir whose archive name was already taken by an earlier one gets an
    /// [`Error::ArchiveNameCollision`] instead, so no two tasks share a file.
    pub fn claim_archive_names(&self) -> Vec<(PathBuf, Result<()>)> {
        let mut claimed: HashMap<OsString, PathBuf> = HashMap::new();
        self.unique_project_dirs()
            .into_iter()
            .map(|project_dir| match claimed.entry(archive_file_name(&project_dir)) {
                Entry::Occupied(entry) => {
                    let error = Error::ArchiveNameCollision {
                        project_dir: project_dir.clone(),
                        claimed_by: entry.get().clone(),
                    };
                    (project_dir, Err(error))
                }
                Entry::Vacant(entry) => {
                    entry.insert(project_dir.clone());
                    (project_dir, Ok(()))
                }
            })
            .collect()
    }

    /// Makes sure the backup directory exists, creating it when missing.
    pub fn prepare_backup_dir(&self) -> Result<()> {
        ensure_dir_exist_or_created(&self.backup_to)
    }

    /// Backs up every project directory concurrently and waits for all of them.
    ///
    /// Fails only when the run cannot start (scratch area, worker pool); the
    /// outcome of each project is in the returned report.
    #[named]
    pub fn run(&self) -> Result<RunReport> {
        tracing::debug!(project_dirs = ?self.project_dirs, "Project directories are given");
        let project_dirs = self.claim_archive_names();
        if project_dirs.is_empty() {
            return Ok(RunReport::default());
        }

        let scratch = self
            .create_scratch_dir()
            .with_debug_object_and_fn_name(self.clone(), function_name!())?;
        tracing::debug!(scratch_dir = ?scratch.path(), "Temporary directory created");

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.jobs.unwrap_or(project_dirs.len()))
            .thread_name(|i| format!("backup-{i}"))
            .build()?;

        let outcomes = pool.install(|| {
            project_dirs
                .into_par_iter()
                .map(|(project_dir, claim)| {
                    let outcome = match claim {
                        Ok(()) => BackupTask::builder()
                            .project_dir(project_dir.clone())
                            .backup_dir(self.backup_to.clone())
                            .scratch_dir(scratch.path())
                            .build()
                            .execute(&self.archiver),
                        Err(e) => {
                            tracing::warn!(
                                project_dir = ?project_dir,
                                error = %e,
                                "Archive name already in use"
                            );
                            TaskOutcome::Failed(e)
                        }
                    };
                    (project_dir, outcome)
                })
                .collect::<Vec<_>>()
        });

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "Unable to remove temporary directory");
        }

        Ok(RunReport { outcomes })
    }

    /// Scratch space lives inside the backup directory so a commit is a rename
    /// within one filesystem.
    fn create_scratch_dir(&self) -> Result<TempDir> {
        let backup_dir = self.backup_to.canonicalize()?;
        Ok(tempfile::Builder::new()
            .prefix(SCRATCH_DIR_PREFIX)
            .tempdir_in(backup_dir)?)
    }
}
