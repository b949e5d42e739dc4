//! Output file naming and persistence
//!
//! Output files are named `<input stem>_<tool suffix>.<extension>`. They are
//! written to a hidden temp file in the output directory and then moved into
//! place, so a failed run never leaves a partial file and two workers never
//! claim the same name.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Result, WorkerError};

/// Upper bound on numbered candidates tried under `CollisionPolicy::Suffix`
const MAX_SUFFIX_ATTEMPTS: usize = 10_000;

/// What to do when the output name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing file
    Overwrite,
    /// Append `_1`, `_2`, ... to the stem until a free name is found
    #[default]
    Suffix,
    /// Fail with an I/O error
    Reject,
}

/// Output file name for an input, e.g. `sample.lnk` + `lecmd` + `csv` -> `sample_lecmd.csv`
pub fn output_file_name(source_name: &Path, suffix: &str, extension: &str) -> String {
    let stem = source_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        format!("{}_{}", stem, suffix)
    } else {
        format!("{}_{}.{}", stem, suffix, extension)
    }
}

/// The `n`th candidate for `file_name`; `n == 0` is the name itself
fn candidate_name(file_name: &str, n: usize) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", file_name, n),
    }
}

/// Hex-encoded SHA-256 of `contents`
pub fn content_digest(contents: &[u8]) -> String {
    hex::encode(Sha256::digest(contents))
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> WorkerError {
    WorkerError::OutputWrite {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Write `contents` to `dir/file_name` according to `policy`, returning the final path
pub fn persist_output(dir: &Path, file_name: &str, contents: &[u8], policy: CollisionPolicy) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".eztools-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| write_error(dir, e))?;
    temp.write_all(contents).map_err(|e| write_error(temp.path(), e))?;
    temp.as_file().sync_all().map_err(|e| write_error(temp.path(), e))?;

    match policy {
        CollisionPolicy::Overwrite => {
            let target = dir.join(file_name);
            temp.persist(&target).map_err(|e| write_error(&target, e.error))?;
            Ok(target)
        }
        CollisionPolicy::Reject => {
            let target = dir.join(file_name);
            claim(temp, &target).map_err(|(err, _)| err)?;
            Ok(target)
        }
        CollisionPolicy::Suffix => {
            for n in 0..MAX_SUFFIX_ATTEMPTS {
                let target = dir.join(candidate_name(file_name, n));
                match claim(temp, &target) {
                    Ok(()) => {
                        if n > 0 {
                            debug!("Output name {} taken, wrote {}", file_name, target.display());
                        }
                        return Ok(target);
                    }
                    Err((WorkerError::OutputCollision(_), Some(file))) => temp = file,
                    Err((err, _)) => return Err(err),
                }
            }
            Err(WorkerError::OutputCollision(dir.join(file_name)))
        }
    }
}

/// Move `temp` to `target` unless it already exists; hands the temp file back on collision
fn claim(temp: NamedTempFile, target: &Path) -> std::result::Result<(), (WorkerError, Option<NamedTempFile>)> {
    match temp.persist_noclobber(target) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Err((WorkerError::OutputCollision(target.to_path_buf()), Some(e.file)))
        }
        Err(e) => Err((write_error(target, e.error), None)),
    }
}
