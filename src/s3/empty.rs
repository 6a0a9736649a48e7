use tracing::{error, info};

use crate::error::EmptyError;
use crate::s3::store::{DeleteBatch, ObjectStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyReport {
    pub bucket: String,
    pub deleted: usize,
    /// `false` when the bucket was missing and lenient mode let it pass.
    pub existed: bool,
}

/// Deletes every object in `bucket` with one bulk-delete.
///
/// A bucket that does not exist counts as already empty unless `strict` is
/// set, in which case the listing error is returned.
pub async fn empty_bucket(
    store: &dyn ObjectStore,
    bucket: &str,
    strict: bool,
) -> Result<EmptyReport, EmptyError> {
    let keys = match store.list_objects(bucket).await {
        Ok(keys) => keys,
        Err(e) if e.is_no_such_bucket() && !strict => {
            info!("Bucket did not exist (thus already empty): {}", bucket);
            return Ok(EmptyReport {
                bucket: bucket.to_string(),
                deleted: 0,
                existed: false,
            });
        }
        Err(source) => {
            let err = EmptyError::List {
                bucket: bucket.to_string(),
                source,
            };
            error!("{}", err);
            return Err(err);
        }
    };

    let deleted = keys.len();
    if deleted > 0 {
        let batch = DeleteBatch {
            bucket: bucket.to_string(),
            keys: keys.into_iter().collect(),
        };
        if let Err(source) = store.delete_objects(&batch).await {
            let err = EmptyError::Delete {
                bucket: bucket.to_string(),
                source,
            };
            error!("{}", err);
            return Err(err);
        }
    }

    info!("Emptied bucket: {} ({} object(s) deleted)", bucket, deleted);
    Ok(EmptyReport {
        bucket: bucket.to_string(),
        deleted,
        existed: true,
    })
}
