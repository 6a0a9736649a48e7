use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinError;

use crate::s3::StoreError;

/// A sync target is missing one of its required fields.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sync_s3 entry #{index}: missing required field `{field}` (bucket_name/local_dir)")]
    MissingField { index: usize, field: &'static str },
}

/// Key derivation was asked for a path that does not live under its root.
#[derive(Debug, Error)]
#[error("{} is not under {}", .path.display(), .root.display())]
pub struct InvalidPathError {
    pub path: PathBuf,
    pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("failed to resolve {}: {source}", .root.display())]
    Resolve {
        root: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to walk {}: {source}", .root.display())]
    Io {
        root: PathBuf,
        source: walkdir::Error,
    },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error in uploading {} to s3://{bucket}/{key}: {source}", .path.display())]
    Upload {
        path: PathBuf,
        bucket: String,
        key: String,
        source: StoreError,
    },
    #[error("upload task for bucket {bucket} did not complete: {source}")]
    Join { bucket: String, source: JoinError },
    #[error("{} of {total} upload(s) to bucket {bucket} failed: {}", .errors.len(), summarize(.errors))]
    Incomplete {
        bucket: String,
        total: usize,
        errors: Vec<SyncError>,
    },
}

#[derive(Debug, Error)]
pub enum EmptyError {
    #[error("error listing s3 bucket {bucket}: {source}")]
    List { bucket: String, source: StoreError },
    #[error("error emptying s3 bucket {bucket}: {source}")]
    Delete { bucket: String, source: StoreError },
    #[error("empty task for bucket {bucket} did not complete: {source}")]
    Join { bucket: String, source: JoinError },
}

/// Failure of a whole run: either nothing was attempted because the targets
/// were invalid, or one phase finished with at least one failed bucket.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{} bucket(s) could not be emptied: {}", .0.len(), summarize(.0))]
    Empty(Vec<EmptyError>),
    #[error("{} bucket(s) could not be synced: {}", .0.len(), summarize(.0))]
    Sync(Vec<SyncError>),
}

fn summarize<E: Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
