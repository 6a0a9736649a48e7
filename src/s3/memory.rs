//! In-memory [`ObjectStore`] for tests. Records every call so tests can count
//! network operations, and fails selected calls on request.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::s3::store::{DeleteBatch, ObjectStore, StoreError, UploadObject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List {
        bucket: String,
    },
    Put {
        bucket: String,
        key: String,
        content_type: String,
    },
    Delete {
        bucket: String,
        keys: usize,
    },
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    body: Vec<u8>,
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, StoredObject>>>,
    calls: Mutex<Vec<Call>>,
    failing_puts: Mutex<HashSet<String>>,
    failing_lists: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default();
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    content_type: "application/octet-stream".to_string(),
                    body: body.to_vec(),
                },
            );
        self
    }

    pub fn fail_put(&self, key: &str) {
        self.failing_puts.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_list(&self, bucket: &str) {
        self.failing_lists.lock().unwrap().insert(bucket.to_string());
    }

    pub fn fail_delete(&self, bucket: &str) {
        self.failing_deletes
            .lock()
            .unwrap()
            .insert(bucket.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Put { .. }))
            .count()
    }

    /// `(key, content type)` of every object in `bucket`, sorted by key.
    pub fn objects(&self, bucket: &str) -> Vec<(String, String)> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(k, o)| (k.clone(), o.content_type.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects(bucket).into_iter().map(|(k, _)| k).collect()
    }

    pub fn body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.body.clone())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn missing(bucket: &str) -> StoreError {
        StoreError::NoSuchBucket {
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        self.record(Call::List {
            bucket: bucket.to_string(),
        });
        if self.failing_lists.lock().unwrap().contains(bucket) {
            return Err(StoreError::Backend("Access Denied".to_string()));
        }
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .ok_or_else(|| Self::missing(bucket))
    }

    async fn put_object(&self, bucket: &str, object: UploadObject) -> Result<(), StoreError> {
        self.record(Call::Put {
            bucket: bucket.to_string(),
            key: object.key.clone(),
            content_type: object.content_type.clone(),
        });
        if self.failing_puts.lock().unwrap().contains(&object.key) {
            return Err(StoreError::Backend("Internal Error".to_string()));
        }
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets.get_mut(bucket).ok_or_else(|| Self::missing(bucket))?;
        objects.insert(
            object.key,
            StoredObject {
                content_type: object.content_type,
                body: object.body,
            },
        );
        Ok(())
    }

    async fn delete_objects(&self, batch: &DeleteBatch) -> Result<(), StoreError> {
        self.record(Call::Delete {
            bucket: batch.bucket.clone(),
            keys: batch.keys.len(),
        });
        if self.failing_deletes.lock().unwrap().contains(&batch.bucket) {
            return Err(StoreError::Backend("Access Denied".to_string()));
        }
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(&batch.bucket)
            .ok_or_else(|| Self::missing(&batch.bucket))?;
        for key in &batch.keys {
            objects.remove(key);
        }
        Ok(())
    }
}
