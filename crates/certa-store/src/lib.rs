//! Namespaced object storage for certa.
//!
//! Every uploaded document and certificate asset lives in one of three
//! logical buckets ([`Bucket::Proof`], [`Bucket::Id`], [`Bucket::Asset`]).
//! The registration workflow writes documents here before it writes the
//! item row, and deletes them again when the row cannot be written.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store with fault injection
//! - [`FsObjectStore`] -- one directory per bucket under a root
//!
//! # Design Rules
//!
//! 1. Keys are relative, `/`-separated and never contain `..`.
//! 2. Uploading to an existing key overwrites it; asset keys are
//!    content-addressed so an overwrite is always with identical bytes.
//! 3. Deleting a missing object is not an error (returns `false`).
//! 4. The public URL of an object is a pure function of bucket and key.

pub mod config;
pub mod error;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod traits;

pub use certa_types::{Bucket, ObjectRef};
pub use config::{BucketNames, StorageBackend, StorageConfig};
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ObjectStore, StoredObject};
