//! Content fingerprints of archive files.
//!
//! A [`Fingerprint`] is the SHA-256 digest of a file's bytes and nothing else: metadata and
//! path never influence it. [`Incumbent`] separates "no archive committed yet" from a real
//! digest so a failed read can never be mistaken for an absent archive.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use derive_more::{Display, From};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From, Display)]
#[display("{}", hex::encode(_0))]
pub struct Fingerprint([u8; 32]);

/// State of the destination archive before a commit decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Incumbent {
    #[display("no-file")]
    Absent,
    #[display("{_0}")]
    Present(Fingerprint),
}

impl Incumbent {
    /// True only when a committed archive exists and has exactly this content.
    pub fn matches(&self, candidate: &Fingerprint) -> bool {
        match self {
            Incumbent::Absent => false,
            Incumbent::Present(fp) => fp == candidate,
        }
    }
}

pub fn fingerprint_file<P: AsRef<Path>>(path: P) -> Result<Fingerprint> {
    let path = path.as_ref();
    let fingerprint = File::open(path)
        .map(BufReader::new)
        .and_then(|mut reader| {
            let mut hasher = Sha256::new();
            std::io::copy(&mut reader, &mut hasher)?;
            let mut digest = [0u8; 32];
            digest.copy_from_slice(&hasher.finalize());
            Ok(Fingerprint::from(digest))
        })
        .map_err(Error::from)
        .with_msg(format!("Unable to get checksum: {path:?}"))?;

    tracing::debug!(input = ?path, output = %fingerprint, "Calculated archive checksum");
    Ok(fingerprint)
}

/// Fingerprints the archive at `path` if there is one.
///
/// Only a missing path yields [`Incumbent::Absent`]; any other failure is an error.
pub fn incumbent_fingerprint<P: AsRef<Path>>(path: P) -> Result<Incumbent> {
    let path = path.as_ref();
    match std::fs::metadata(path) {
        Ok(_) => fingerprint_file(path).map(Incumbent::Present),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(input = ?path, "No previous archive");
            Ok(Incumbent::Absent)
        }
        Err(e) => Err(Error::from(e).with_msg(format!("Unable to stat previous archive: {path:?}"))),
    }
}
