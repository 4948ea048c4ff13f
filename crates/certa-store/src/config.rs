use std::path::PathBuf;

use certa_types::Bucket;
use serde::{Deserialize, Serialize};

/// Which backend the service stores objects in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

/// Physical names of the three logical buckets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketNames {
    pub proof: String,
    pub id: String,
    pub asset: String,
}

impl BucketNames {
    pub fn name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Proof => &self.proof,
            Bucket::Id => &self.id,
            Bucket::Asset => &self.asset,
        }
    }

    /// Reverse lookup from a physical name.
    pub fn bucket(&self, name: &str) -> Option<Bucket> {
        Bucket::ALL.into_iter().find(|b| self.name(*b) == name)
    }
}

impl Default for BucketNames {
    fn default() -> Self {
        Self {
            proof: "proofs".into(),
            id: "ids".into(),
            asset: "assets".into(),
        }
    }
}

/// Object storage configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend.
    pub root: PathBuf,
    /// Prefix of every public object URL, without a trailing slash.
    pub public_base_url: String,
    pub buckets: BucketNames,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            root: PathBuf::from("./data/objects"),
            public_base_url: "http://127.0.0.1:8787/v1/objects".into(),
            buckets: BucketNames::default(),
        }
    }
}

impl StorageConfig {
    /// `{public_base_url}/{bucket_name}/{path}`.
    pub fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.buckets.name(bucket),
            path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bucket_names() {
        let names = BucketNames::default();
        assert_eq!(names.name(Bucket::Proof), "proofs");
        assert_eq!(names.name(Bucket::Id), "ids");
        assert_eq!(names.name(Bucket::Asset), "assets");
        assert_eq!(names.bucket("ids"), Some(Bucket::Id));
        assert_eq!(names.bucket("nope"), None);
    }

    #[test]
    fn public_url_trims_trailing_slash() {
        let config = StorageConfig {
            public_base_url: "https://cdn.example/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.public_url(Bucket::Asset, "ab.png"),
            "https://cdn.example/assets/ab.png"
        );
    }
}
