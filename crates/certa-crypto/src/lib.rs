//! Content hashing for certa.
//!
//! Asset uploads are content-addressed so that a retried upload of the same
//! bytes lands at the same key, and in-flight submissions are fingerprinted
//! so duplicates can be refused. Both use domain-separated BLAKE3.

pub mod hasher;

pub use hasher::{ContentDigest, ContentHasher};
