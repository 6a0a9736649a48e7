pub mod client;
pub mod empty;
#[cfg(test)]
pub mod memory;
pub mod store;
pub mod sync;

pub use client::{S3Store, create_s3_client};
pub use empty::{EmptyReport, empty_bucket};
pub use store::{DeleteBatch, ObjectStore, StoreError, UploadObject};
pub use sync::{SyncReport, sync_to_s3};
