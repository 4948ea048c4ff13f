use async_trait::async_trait;
use bytes::Bytes;
use certa_types::{Bucket, ObjectRef};

use crate::error::StoreResult;

/// Object bytes together with their declared content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Namespaced blob storage.
///
/// All implementations must satisfy these invariants:
/// - `upload` either stores the full object or stores nothing.
/// - `delete` of a missing object returns `Ok(false)`, never an error.
/// - `public_url` is a pure function of bucket and key, so the URL returned
///   by `upload` can be recomputed later.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return where it landed.
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<ObjectRef>;

    /// Delete an object. Returns `true` if the object existed.
    async fn delete(&self, bucket: Bucket, path: &str) -> StoreResult<bool>;

    /// Check whether an object exists.
    async fn exists(&self, bucket: Bucket, path: &str) -> StoreResult<bool>;

    /// Read an object back. Returns `Ok(None)` if it does not exist.
    async fn download(&self, bucket: Bucket, path: &str) -> StoreResult<Option<StoredObject>>;

    /// Public URL an object is served under.
    fn public_url(&self, bucket: Bucket, path: &str) -> String;
}
