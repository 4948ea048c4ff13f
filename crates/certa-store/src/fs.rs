use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use certa_types::{Bucket, ObjectRef};
use tokio::fs;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::StoreResult;
use crate::keys::validate_key;
use crate::traits::{ObjectStore, StoredObject};

/// Directory holding content-type sidecars, parallel to the bucket dirs.
const META_DIR: &str = ".meta";

/// Filesystem-backed object store.
///
/// Each bucket is a directory under the root, and each object a file at its
/// key. Writes go to a temporary file that is renamed into place, so a
/// reader never observes a partial object.
pub struct FsObjectStore {
    root: PathBuf,
    config: StorageConfig,
}

impl FsObjectStore {
    /// Open a store rooted at `config.root`, creating bucket directories.
    pub async fn open(config: StorageConfig) -> StoreResult<Self> {
        let root = config.root.clone();
        for bucket in Bucket::ALL {
            fs::create_dir_all(root.join(config.buckets.name(bucket))).await?;
        }
        info!("object storage directory: {}", root.display());
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: Bucket, key: &str) -> PathBuf {
        self.root.join(self.config.buckets.name(bucket)).join(key)
    }

    fn meta_path(&self, bucket: Bucket, key: &str) -> PathBuf {
        self.root
            .join(META_DIR)
            .join(self.config.buckets.name(bucket))
            .join(key)
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await
}

async fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<ObjectRef> {
        validate_key(key)?;
        write_atomic(&self.object_path(bucket, key), &bytes).await?;
        write_atomic(&self.meta_path(bucket, key), content_type.as_bytes()).await?;
        debug!(%bucket, key, len = bytes.len(), "object written");
        Ok(ObjectRef {
            bucket,
            path: key.to_string(),
            url: self.public_url(bucket, key),
        })
    }

    async fn delete(&self, bucket: Bucket, path: &str) -> StoreResult<bool> {
        validate_key(path)?;
        let existed = remove_if_present(&self.object_path(bucket, path)).await?;
        remove_if_present(&self.meta_path(bucket, path)).await?;
        Ok(existed)
    }

    async fn exists(&self, bucket: Bucket, path: &str) -> StoreResult<bool> {
        validate_key(path)?;
        Ok(fs::try_exists(self.object_path(bucket, path)).await?)
    }

    async fn download(&self, bucket: Bucket, path: &str) -> StoreResult<Option<StoredObject>> {
        validate_key(path)?;
        let bytes = match fs::read(self.object_path(bucket, path)).await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match fs::read_to_string(self.meta_path(bucket, path)).await {
            Ok(ct) => ct,
            Err(e) if e.kind() == io::ErrorKind::NotFound => "application/octet-stream".into(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredObject {
            bytes: Bytes::from(bytes),
            content_type,
        }))
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.config.public_url(bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    async fn open_temp() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let store = FsObjectStore::open(config).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn open_creates_bucket_dirs() {
        let (dir, _store) = open_temp().await;
        assert!(dir.path().join("proofs").is_dir());
        assert!(dir.path().join("ids").is_dir());
        assert!(dir.path().join("assets").is_dir());
    }

    #[tokio::test]
    async fn upload_download_delete() {
        let (dir, store) = open_temp().await;
        let obj = store
            .upload(Bucket::Proof, "owner/1_bill.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();
        assert_eq!(obj.url, "http://127.0.0.1:8787/v1/objects/proofs/owner/1_bill.pdf");
        assert!(dir.path().join("proofs/owner/1_bill.pdf").is_file());

        let back = store
            .download(Bucket::Proof, "owner/1_bill.pdf")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&back.bytes[..], b"%PDF");
        assert_eq!(back.content_type, "application/pdf");

        assert!(store.delete(Bucket::Proof, "owner/1_bill.pdf").await.unwrap());
        assert!(!store.exists(Bucket::Proof, "owner/1_bill.pdf").await.unwrap());
        assert!(!store.delete(Bucket::Proof, "owner/1_bill.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn download_missing_is_none() {
        let (_dir, store) = open_temp().await;
        assert!(store.download(Bucket::Asset, "nope.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let (_dir, store) = open_temp().await;
        store.upload(Bucket::Asset, "a.json", Bytes::from_static(b"1"), "application/json").await.unwrap();
        store.upload(Bucket::Asset, "a.json", Bytes::from_static(b"2"), "application/json").await.unwrap();
        let back = store.download(Bucket::Asset, "a.json").await.unwrap().unwrap();
        assert_eq!(&back.bytes[..], b"2");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_dir, store) = open_temp().await;
        let err = store.exists(Bucket::Id, "../proofs/x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
