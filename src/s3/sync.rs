use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::SyncTarget;
use crate::error::{SyncError, WalkError};
use crate::s3::store::{ObjectStore, UploadObject};
use crate::utils::{get_mime_type, to_storage_key, walk_files};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub bucket: String,
    pub uploaded: usize,
}

/// Uploads every file under `target.local_dir` to `target.bucket_name`,
/// keyed by its slash-separated path relative to the directory.
///
/// All uploads are attempted even when some of them fail; the failures are
/// returned together in [`SyncError::Incomplete`]. Callers needing fail-fast
/// behaviour have to cancel the future themselves.
///
/// `permits` bounds how many uploads are in flight, and may be shared by
/// several concurrent syncs.
pub async fn sync_to_s3(
    store: Arc<dyn ObjectStore>,
    target: &SyncTarget,
    permits: Arc<Semaphore>,
) -> Result<SyncReport, SyncError> {
    let bucket = target.bucket_name.clone();
    let root = std::path::absolute(&target.local_dir).map_err(|source| WalkError::Resolve {
        root: target.local_dir.clone(),
        source,
    })?;

    let files = walk_files(&root)
        .inspect_err(|e| error!("Error trying to sync the bucket {}: {}", bucket, e))?;
    let total = files.len();
    if total == 0 {
        info!("No files to upload from {}, bucket {} left as is", root.display(), bucket);
        return Ok(SyncReport { bucket, uploaded: 0 });
    }

    let mut failures: Vec<SyncError> = Vec::new();
    let mut set = JoinSet::new();

    for path in files {
        info!("Processing file: {}", path.display());
        let key = match to_storage_key(&path, &root) {
            Ok(key) => key,
            Err(e) => {
                error!("{}", e);
                failures.push(e.into());
                continue;
            }
        };
        debug!("Map local file: {:?} -> S3 Key: {}", path, key);

        let store = Arc::clone(&store);
        let permits = Arc::clone(&permits);
        let bucket = bucket.clone();

        set.spawn(async move {
            let _permit = permits.acquire().await;

            let body = tokio::fs::read(&path)
                .await
                .map_err(|source| SyncError::Read {
                    path: path.clone(),
                    source,
                })?;
            let object = UploadObject {
                key: key.clone(),
                body,
                content_type: get_mime_type(&path).to_string(),
            };

            match store.put_object(&bucket, object).await {
                Ok(()) => {
                    info!("Successfully uploaded {} to s3://{}/{}", path.display(), bucket, key);
                    Ok::<(), SyncError>(())
                }
                Err(source) => Err(SyncError::Upload {
                    path,
                    bucket,
                    key,
                    source,
                }),
            }
        });
    }

    while let Some(res) = set.join_next().await {
        let failure = match res {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => SyncError::Join {
                bucket: bucket.clone(),
                source: e,
            },
        };
        error!("{}", failure);
        failures.push(failure);
    }

    if failures.is_empty() {
        info!("Bucket is synced: {} ({} file(s))", bucket, total);
        Ok(SyncReport {
            bucket,
            uploaded: total,
        })
    } else {
        let err = SyncError::Incomplete {
            bucket,
            total,
            errors: failures,
        };
        error!("Error trying to sync the bucket: {}", err);
        Err(err)
    }
}
