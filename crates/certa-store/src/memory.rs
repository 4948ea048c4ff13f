use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use certa_types::{Bucket, ObjectRef};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{StoreError, StoreResult};
use crate::keys::validate_key;
use crate::traits::{ObjectStore, StoredObject};

/// Injected failures, consumed by the next matching call.
#[derive(Default)]
struct Faults {
    /// Every upload to these buckets fails.
    broken_buckets: HashSet<Bucket>,
    /// The next N uploads to a bucket fail.
    pending_upload_failures: HashMap<Bucket, usize>,
    /// Every delete fails.
    deletes_fail: bool,
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests, demos and single-process deployments. Objects are
/// held behind a `RwLock`; fault injection lets tests make individual
/// buckets or deletes fail.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<(Bucket, String), StoredObject>>,
    uploads: Mutex<HashMap<Bucket, usize>>,
    faults: Mutex<Faults>,
    config: StorageConfig,
}

impl InMemoryObjectStore {
    /// Create an empty store with default URL configuration.
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    /// Create an empty store that builds URLs from `config`.
    pub fn with_config(config: StorageConfig) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            uploads: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            config,
        }
    }

    /// Number of objects currently stored across all buckets.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Sorted keys stored in one bucket.
    pub fn keys(&self, bucket: Bucket) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .filter(|(b, _)| *b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of successful uploads to a bucket since creation.
    pub fn upload_count(&self, bucket: Bucket) -> usize {
        self.uploads
            .lock()
            .expect("lock poisoned")
            .get(&bucket)
            .copied()
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Make every upload to `bucket` fail until [`Self::clear_faults`].
    pub fn break_bucket(&self, bucket: Bucket) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .broken_buckets
            .insert(bucket);
    }

    /// Make the next `count` uploads to `bucket` fail.
    pub fn fail_next_uploads(&self, bucket: Bucket, count: usize) {
        *self
            .faults
            .lock()
            .expect("lock poisoned")
            .pending_upload_failures
            .entry(bucket)
            .or_default() += count;
    }

    /// Make every delete fail (or succeed again).
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.lock().expect("lock poisoned").deletes_fail = fail;
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.lock().expect("lock poisoned") = Faults::default();
    }

    fn take_upload_fault(&self, bucket: Bucket) -> bool {
        let mut faults = self.faults.lock().expect("lock poisoned");
        if faults.broken_buckets.contains(&bucket) {
            return true;
        }
        match faults.pending_upload_failures.get_mut(&bucket) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<ObjectRef> {
        validate_key(key)?;
        if self.take_upload_fault(bucket) {
            return Err(StoreError::Unavailable(format!(
                "injected upload failure for bucket {bucket}"
            )));
        }

        let len = bytes.len();
        self.objects.write().expect("lock poisoned").insert(
            (bucket, key.to_string()),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        *self
            .uploads
            .lock()
            .expect("lock poisoned")
            .entry(bucket)
            .or_default() += 1;

        debug!(%bucket, key, len, "object stored");
        Ok(ObjectRef {
            bucket,
            path: key.to_string(),
            url: self.public_url(bucket, key),
        })
    }

    async fn delete(&self, bucket: Bucket, path: &str) -> StoreResult<bool> {
        if self.faults.lock().expect("lock poisoned").deletes_fail {
            return Err(StoreError::Unavailable(format!(
                "injected delete failure for {bucket}/{path}"
            )));
        }
        let removed = self
            .objects
            .write()
            .expect("lock poisoned")
            .remove(&(bucket, path.to_string()))
            .is_some();
        Ok(removed)
    }

    async fn exists(&self, bucket: Bucket, path: &str) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(&(bucket, path.to_string())))
    }

    async fn download(&self, bucket: Bucket, path: &str) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(&(bucket, path.to_string())).cloned())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.config.public_url(bucket, path)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> Bytes {
        Bytes::from_static(b"\x89PNG fake")
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_then_download() {
        let store = InMemoryObjectStore::new();
        let obj = store
            .upload(Bucket::Asset, "abc.png", png(), "image/png")
            .await
            .unwrap();
        assert_eq!(obj.bucket, Bucket::Asset);
        assert_eq!(obj.path, "abc.png");
        assert_eq!(obj.url, "http://127.0.0.1:8787/v1/objects/assets/abc.png");

        let back = store.download(Bucket::Asset, "abc.png").await.unwrap().unwrap();
        assert_eq!(back.bytes, png());
        assert_eq!(back.content_type, "image/png");
    }

    #[tokio::test]
    async fn buckets_are_namespaced() {
        let store = InMemoryObjectStore::new();
        store.upload(Bucket::Proof, "k", png(), "x").await.unwrap();
        assert!(store.exists(Bucket::Proof, "k").await.unwrap());
        assert!(!store.exists(Bucket::Id, "k").await.unwrap());
        assert_eq!(store.keys(Bucket::Proof), vec!["k".to_string()]);
        assert!(store.keys(Bucket::Id).is_empty());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = InMemoryObjectStore::new();
        store.upload(Bucket::Id, "a/b", png(), "x").await.unwrap();
        assert!(store.delete(Bucket::Id, "a/b").await.unwrap());
        assert!(!store.delete(Bucket::Id, "a/b").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_bad_key() {
        let store = InMemoryObjectStore::new();
        let err = store
            .upload(Bucket::Id, "../escape", png(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn fail_next_uploads_is_consumed() {
        let store = InMemoryObjectStore::new();
        store.fail_next_uploads(Bucket::Asset, 1);
        let err = store
            .upload(Bucket::Asset, "a", png(), "x")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        store.upload(Bucket::Asset, "a", png(), "x").await.unwrap();
        assert_eq!(store.upload_count(Bucket::Asset), 1);
    }

    #[tokio::test]
    async fn broken_bucket_fails_until_cleared() {
        let store = InMemoryObjectStore::new();
        store.break_bucket(Bucket::Id);
        assert!(store.upload(Bucket::Id, "a", png(), "x").await.is_err());
        assert!(store.upload(Bucket::Id, "a", png(), "x").await.is_err());
        assert!(store.upload(Bucket::Proof, "a", png(), "x").await.is_ok());
        store.clear_faults();
        assert!(store.upload(Bucket::Id, "a", png(), "x").await.is_ok());
    }

    #[tokio::test]
    async fn failing_deletes_keep_objects() {
        let store = InMemoryObjectStore::new();
        store.upload(Bucket::Proof, "a", png(), "x").await.unwrap();
        store.fail_deletes(true);
        assert!(store.delete(Bucket::Proof, "a").await.is_err());
        assert!(store.exists(Bucket::Proof, "a").await.unwrap());
    }
}
