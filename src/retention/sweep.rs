//! Single pass over the dump directory.
//!
//! A directory entry is deleted only when all of the following hold, checked
//! in order and stopping at the first failure:
//!
//! 1. its file name ends with the policy suffix (no filesystem access),
//! 2. it is a regular file (symlinks are followed),
//! 3. it was last modified strictly before `now - max_age`.
//!
//! Deletion failures are collected per file and never abort the pass.

use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    error::{RetentionError, RetentionResult},
    policy::RetentionPolicy,
};
use crate::observability::metrics;

/// A directory entry whose name matched the dump suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub is_regular_file: bool,
}

impl CandidateFile {
    /// Read the metadata of `path`, following symlinks.
    pub async fn inspect(path: PathBuf) -> io::Result<Self> {
        let metadata = tokio::fs::metadata(&path).await?;
        let modified = DateTime::<Utc>::from(metadata.modified()?);

        Ok(Self {
            path,
            modified,
            is_regular_file: metadata.is_file(),
        })
    }
}

/// A dump file that could not be deleted.
#[derive(Debug)]
pub struct DeleteFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Outcome of a single sweep.
#[derive(Debug, Default)]
pub struct SweepResult {
    /// Number of dump files deleted.
    pub deleted: u64,
    /// Files that were eligible but could not be deleted, in attempt order.
    pub errors: Vec<DeleteFailure>,
}

impl SweepResult {
    pub fn has_deletions(&self) -> bool {
        self.deleted > 0
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Removes a dump file from storage.
#[async_trait]
pub trait DumpRemover: Send + Sync {
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Deletes files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

#[async_trait]
impl DumpRemover for FsRemover {
    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Case-sensitive suffix match on the raw file name.
pub fn has_dump_suffix(file_name: &OsStr, suffix: &str) -> bool {
    file_name.as_encoded_bytes().ends_with(suffix.as_bytes())
}

/// Regular file last modified strictly before `cutoff`.
pub fn is_expired(candidate: &CandidateFile, cutoff: DateTime<Utc>) -> bool {
    candidate.is_regular_file && candidate.modified < cutoff
}

/// List the dump files that a sweep at `now` would delete, sorted by path.
pub async fn find_expired_dumps(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> RetentionResult<Vec<CandidateFile>> {
    let read_dir_error = |source| RetentionError::ReadDir {
        directory: policy.directory().to_path_buf(),
        source,
    };

    let cutoff = policy.cutoff(now);
    let mut entries = tokio::fs::read_dir(policy.directory())
        .await
        .map_err(read_dir_error)?;
    let mut expired = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
        if !has_dump_suffix(&entry.file_name(), policy.suffix()) {
            continue;
        }

        let candidate = match CandidateFile::inspect(entry.path()).await {
            Ok(candidate) => candidate,
            Err(e) => {
                // Dangling symlink, or removed since it was listed
                tracing::debug!(path = ?entry.path(), error = %e, "Skipping unreadable dump candidate");
                continue;
            }
        };

        if is_expired(&candidate, cutoff) {
            expired.push(candidate);
        }
    }

    expired.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(expired)
}

/// Delete every expired dump file in the policy directory.
///
/// Fails only when the directory itself cannot be listed.
pub async fn sweep(
    policy: &RetentionPolicy,
    remover: &dyn DumpRemover,
    now: DateTime<Utc>,
) -> RetentionResult<SweepResult> {
    let expired = find_expired_dumps(policy, now).await?;
    let mut result = SweepResult::default();

    for candidate in expired {
        match remover.remove(&candidate.path).await {
            Ok(()) => result.deleted += 1,
            Err(error) => {
                tracing::warn!(
                    path = %candidate.path.display(),
                    error = %error,
                    "Failed to delete dump file"
                );
                metrics::record_sweep_error("delete");
                result.errors.push(DeleteFailure {
                    path: candidate.path,
                    error,
                });
            }
        }
    }

    if result.has_deletions() {
        metrics::record_dump_deletions(result.deleted);
        tracing::info!(
            directory = %policy.directory().display(),
            deleted = result.deleted,
            failed = result.errors.len(),
            "Deleted {} dump file(s) from '{}'",
            result.deleted,
            policy.directory().display()
        );
    } else {
        tracing::debug!(
            directory = %policy.directory().display(),
            failed = result.errors.len(),
            "Dump sweep complete, nothing deleted"
        );
    }

    Ok(result)
}
