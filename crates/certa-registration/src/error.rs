use certa_gate::GateError;
use certa_records::RecordError;
use certa_store::StoreError;
use certa_types::{DocumentKind, WalletAddress};

/// Why a registration did not produce an item.
///
/// None of these are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("no user with wallet {0}")]
    UserNotFound(WalletAddress),

    #[error("failed to upload {document} document")]
    StorageUpload {
        document: DocumentKind,
        #[source]
        source: StoreError,
    },

    #[error("failed to look up owner")]
    RecordLookup(#[source] RecordError),

    #[error("failed to write item record")]
    RecordWrite(#[source] RecordError),

    #[error("an identical registration is already in progress")]
    DuplicateSubmission,
}

impl RegistrationError {
    /// Stable discriminant for callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UserNotFound(_) => "user_not_found",
            Self::StorageUpload { .. } => "storage_upload_error",
            Self::RecordLookup(_) => "record_lookup_error",
            Self::RecordWrite(_) => "record_write_error",
            Self::DuplicateSubmission => "duplicate_submission",
        }
    }

    /// Message including the underlying cause, for display to a caller.
    pub fn detail(&self) -> String {
        match std::error::Error::source(self) {
            Some(source) => format!("{self}: {source}"),
            None => self.to_string(),
        }
    }
}

impl From<GateError> for RegistrationError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::DuplicateSubmission => Self::DuplicateSubmission,
            GateError::Rejected { reason, .. } => Self::Validation(reason),
            other => Self::Validation(other.to_string()),
        }
    }
}
