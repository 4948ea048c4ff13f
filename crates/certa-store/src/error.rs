use certa_types::Bucket;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {bucket}/{path}")]
    NotFound { bucket: Bucket, path: String },

    /// The key is empty, absolute, or escapes its bucket.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The backend refused the request (quota, permissions, size).
    #[error("request rejected by storage backend: {0}")]
    Rejected(String),

    /// The backend could not be reached or timed out.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
