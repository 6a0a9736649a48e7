use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::{SyncConfig, SyncTarget, TargetConfig, validate_targets};
use crate::error::{EmptyError, OrchestratorError, SyncError};
use crate::s3::{EmptyReport, ObjectStore, SyncReport, empty_bucket, sync_to_s3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Fail when a bucket to empty does not exist.
    pub strict: bool,
    /// Upper bound on uploads in flight across all buckets.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            strict: false,
            concurrency: 50,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            strict: config.strict,
            concurrency: config.concurrency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub buckets_emptied: usize,
    pub objects_deleted: usize,
    pub files_uploaded: usize,
}

impl RunSummary {
    fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            buckets_emptied: 0,
            objects_deleted: 0,
            files_uploaded: 0,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Local::now();
        info!(
            "Emptied: {} bucket(s), {} object(s) | Uploaded: {} file(s) | Time: {} | Took: {}ms",
            self.buckets_emptied,
            self.objects_deleted,
            self.files_uploaded,
            self.finished_at.format("%Y-%m-%d %H:%M:%S"),
            (self.finished_at - self.started_at).num_milliseconds()
        );
        self
    }
}

/// Runs the empty and sync phases over a list of targets with one shared
/// store handle.
///
/// Within a phase every bucket is processed concurrently and a failing bucket
/// never stops its siblings; the phase reports all failures once everything
/// has finished. `run_sync` only starts uploading after every bucket has been
/// emptied successfully.
pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    options: SyncOptions,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, options: SyncOptions) -> Self {
        Self { store, options }
    }

    /// Empties every target bucket, then uploads every target directory.
    /// `None` means no target list was configured, which is a no-op.
    pub async fn run_sync(
        &self,
        targets: Option<&[TargetConfig]>,
    ) -> Result<RunSummary, OrchestratorError> {
        let started_at = Local::now();
        let Some(targets) = self.prepare(targets)? else {
            return Ok(RunSummary::new(started_at));
        };

        info!("sync starting...");
        let mut summary = RunSummary::new(started_at);

        let emptied = self.empty_phase(&targets).await?;
        summary.buckets_emptied = emptied.len();
        summary.objects_deleted = emptied.iter().map(|r| r.deleted).sum();

        let synced = self.sync_phase(&targets).await?;
        summary.files_uploaded = synced.iter().map(|r| r.uploaded).sum();

        info!("sync end");
        Ok(summary.finish())
    }

    /// Empties every target bucket.
    pub async fn run_empty(
        &self,
        targets: Option<&[TargetConfig]>,
    ) -> Result<RunSummary, OrchestratorError> {
        let started_at = Local::now();
        let Some(targets) = self.prepare(targets)? else {
            return Ok(RunSummary::new(started_at));
        };

        info!("remove starting...");
        let mut summary = RunSummary::new(started_at);

        let emptied = self.empty_phase(&targets).await?;
        summary.buckets_emptied = emptied.len();
        summary.objects_deleted = emptied.iter().map(|r| r.deleted).sum();

        info!("remove end");
        Ok(summary.finish())
    }

    fn prepare(
        &self,
        targets: Option<&[TargetConfig]>,
    ) -> Result<Option<Vec<SyncTarget>>, OrchestratorError> {
        let Some(targets) = targets else {
            info!("No configuration found");
            return Ok(None);
        };
        validate_targets(targets).map(Some).map_err(|e| {
            error!("{}", e);
            OrchestratorError::from(e)
        })
    }

    async fn empty_phase(
        &self,
        targets: &[SyncTarget],
    ) -> Result<Vec<EmptyReport>, OrchestratorError> {
        info!("Emptying bucket(s)...");
        // Several directories may feed the same bucket; it is emptied once.
        let mut buckets: Vec<&str> = Vec::new();
        for target in targets {
            if !buckets.contains(&target.bucket_name.as_str()) {
                buckets.push(&target.bucket_name);
            }
        }

        let mut set = JoinSet::new();
        let mut task_buckets = HashMap::new();
        for bucket in buckets {
            info!("Emptying bucket: {}", bucket);
            let store = Arc::clone(&self.store);
            let owned = bucket.to_string();
            let strict = self.options.strict;
            let handle =
                set.spawn(async move { empty_bucket(store.as_ref(), &owned, strict).await });
            task_buckets.insert(handle.id(), bucket.to_string());
        }

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => failures.push(e),
                Err(e) => {
                    let bucket = task_buckets.get(&e.id()).cloned().unwrap_or_default();
                    failures.push(EmptyError::Join { bucket, source: e });
                }
            }
        }

        if failures.is_empty() {
            info!("Bucket(s) are empty");
            Ok(reports)
        } else {
            let err = OrchestratorError::Empty(failures);
            error!("Error trying to empty the bucket(s): {}", err);
            Err(err)
        }
    }

    async fn sync_phase(&self, targets: &[SyncTarget]) -> Result<Vec<SyncReport>, OrchestratorError> {
        info!("Syncing bucket(s)...");
        let permits = Arc::new(Semaphore::new(
            self.options.concurrency.clamp(1, Semaphore::MAX_PERMITS),
        ));

        let mut set = JoinSet::new();
        let mut task_buckets = HashMap::new();
        for target in targets {
            info!(
                "Processing bucket/folder {}/{}",
                target.bucket_name,
                target.local_dir.display()
            );
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            let target = target.clone();
            let bucket = target.bucket_name.clone();
            let handle = set.spawn(async move { sync_to_s3(store, &target, permits).await });
            task_buckets.insert(handle.id(), bucket);
        }

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => failures.push(e),
                Err(e) => {
                    let bucket = task_buckets.get(&e.id()).cloned().unwrap_or_default();
                    failures.push(SyncError::Join { bucket, source: e });
                }
            }
        }

        if failures.is_empty() {
            info!("Bucket(s) are synced");
            Ok(reports)
        } else {
            let err = OrchestratorError::Sync(failures);
            error!("Error trying to sync the bucket(s): {}", err);
            Err(err)
        }
    }
}
