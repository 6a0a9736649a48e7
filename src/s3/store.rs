use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

/// One file's worth of work for a put: key, full body and content type.
#[derive(Debug, Clone)]
pub struct UploadObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Every key of a bucket, removed with a single bulk-delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBatch {
    pub bucket: String,
    pub keys: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("the specified bucket does not exist: {bucket}")]
    NoSuchBucket { bucket: String },
    #[error("{} object(s) could not be deleted: {}", .0.len(), .0.join(", "))]
    PartialDelete(Vec<String>),
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_no_such_bucket(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. })
    }
}

/// The three object-storage calls the synchronizer needs.
///
/// Implementations must be safe to share across tasks; a single handle is
/// built per run and used by every upload, listing and delete.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns every key in `bucket`, across all listing pages.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError>;

    /// Creates or overwrites one object.
    async fn put_object(&self, bucket: &str, object: UploadObject) -> Result<(), StoreError>;

    /// Removes every key of the batch.
    async fn delete_objects(&self, batch: &DeleteBatch) -> Result<(), StoreError>;
}
