//! Mirrors local directories into S3 buckets.
//!
//! Each configured target pairs a directory with a bucket. A sync empties
//! every target bucket and then uploads every file of every directory, keyed
//! by its slash-separated relative path. A remove only empties the buckets.
//! There is no diffing: every run re-uploads everything.

pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod s3;
pub mod utils;

pub use config::{SyncConfig, SyncTarget, TargetConfig};
pub use error::{ConfigError, EmptyError, InvalidPathError, OrchestratorError, SyncError, WalkError};
pub use handlers::{Hook, SyncPlugin};
pub use orchestrator::{Orchestrator, RunSummary, SyncOptions};
