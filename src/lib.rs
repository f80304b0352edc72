//! # backup-projects
//!
//! Keeps one up-to-date tar archive per project directory.
//!
//! ## Features
//!
//! - **Parallel Backups**: every project directory is archived on its own worker
//! - **Checksum Dedup**: a new archive replaces the previous one only if its SHA-256 differs
//! - **Atomic Replace**: archives are built in a scratch area next to the destination and renamed into place
//! - **Stable Naming**: `/home/u/proj` is stored as `:home:u:proj.tar`
//!
//! ## Quick Start
//!
//! ```no_run
//! use backup_projects::backup::backup_config::BackupConfig;
//! use std::path::PathBuf;
//!
//! let config = BackupConfig::builder()
//!     .project_dirs(vec![PathBuf::from("/home/u/projA"), PathBuf::from("/home/u/projB")])
//!     .backup_to("/backups")
//!     .build();
//! config.prepare_backup_dir()?;
//! let report = config.run()?;
//! for (project_dir, outcome) in &report.outcomes {
//!     println!("{project_dir:?}: {outcome}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
pub mod cli;
pub mod logging;
