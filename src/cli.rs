use crate::backup::archive::builtin::BuiltinArchiver;
use crate::backup::archive::external::ExternalArchiver;
use crate::backup::archive::ArchiverConfig;
use crate::backup::backup_config::{BackupConfig, RunReport};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::task::TaskState;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};
use validator::Validate;

pub static EXIT_FAILURE: i32 = 1;
pub static EXIT_SUCCESS: i32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ArchiverKind {
    /// Run an external `tar` executable
    External,
    /// Write the tar stream in-process
    Builtin,
}

/// Backup projects
#[derive(Parser, Debug)]
#[command(name = "backup-projects", version, about, long_about = None)]
pub struct Args {
    /// Project directories to back up
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dirs: Vec<PathBuf>,

    /// Path to place backup archives
    #[arg(long, value_name = "PATH")]
    pub backup_to: Option<String>,

    /// Debug mode
    #[arg(long)]
    pub debug: bool,

    /// YAML config file, command line values take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How archives are created
    #[arg(long, value_enum)]
    pub archiver: Option<ArchiverKind>,

    /// tar executable used by the external archiver
    #[arg(long)]
    pub tar_program: Option<PathBuf>,

    /// Maximum number of projects archived at once (default: all of them)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl Args {
    fn archiver_override(&self) -> Option<ArchiverConfig> {
        let external = || -> ArchiverConfig {
            match &self.tar_program {
                Some(program) => ExternalArchiver::builder().program(program).build(),
                None => ExternalArchiver::default(),
            }
            .into()
        };
        match self.archiver {
            Some(ArchiverKind::Builtin) => Some(BuiltinArchiver::default().into()),
            Some(ArchiverKind::External) => Some(external()),
            None if self.tar_program.is_some() => Some(external()),
            None => None,
        }
    }

    /// Combines the optional config file with the command line.
    pub fn into_config(self) -> Result<BackupConfig> {
        let base = match &self.config {
            Some(path) => BackupConfig::from_yaml_file(path)?,
            None => BackupConfig::default(),
        };
        let archiver = self.archiver_override();
        Ok(base.merged(
            self.project_dirs,
            self.backup_to.map(PathBuf::from),
            archiver,
            self.jobs,
        ))
    }
}

/// Runs the tool and returns the process exit code.
///
/// Only a failed precondition gives a non-zero code, task failures are logged.
pub fn run(args: Args) -> i32 {
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return EXIT_FAILURE;
        }
    };

    if let Err(e) = config
        .validate()
        .map_err(Error::from)
        .with_msg("Config validation failed")
    {
        error!("{}", precondition_message(&e));
        return EXIT_FAILURE;
    }

    if let Err(e) = config.prepare_backup_dir() {
        error!("Unable to create backup directory: {e}");
        return EXIT_FAILURE;
    }

    match config.run() {
        Ok(report) => {
            log_summary(&report);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("{e}");
            EXIT_FAILURE
        }
    }
}

/// The message for a failed config check, naming the first missing required value.
fn precondition_message(error: &Error) -> String {
    match error.root_cause() {
        Error::ValidationError(errors) if errors.field_errors().contains_key("project_dirs") => {
            "Projects dirs must be specified.".to_string()
        }
        Error::ValidationError(errors) if errors.field_errors().contains_key("backup_to") => {
            "Backup directory must be specified.".to_string()
        }
        _ => error.to_string(),
    }
}

fn log_summary(report: &RunReport) {
    info!(
        committed = report.count(TaskState::Committed),
        skipped = report.count(TaskState::Skipped),
        failed = report.count(TaskState::Failed),
        "Backup finished"
    );
}
