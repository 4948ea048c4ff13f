use certa_chain::{ChainError, IpError};
use certa_gate::GateError;

/// The error behind a failed step.
///
/// Storage and record errors are kept as messages so a failure can be
/// cloned into the step stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MintStepError {
    #[error("{0}")]
    Preflight(String),

    #[error("asset upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Ip(#[from] IpError),

    #[error("failed to persist certificate: {0}")]
    Persist(String),

    #[error("cancelled")]
    Cancelled,

    /// The workflow tried a step its state machine does not allow.
    #[error("internal step error: {0}")]
    Internal(String),
}

impl MintStepError {
    /// Whether running the attempt again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Preflight(_) | Self::Cancelled | Self::Internal(_) => false,
            Self::Chain(e) => e.is_retryable(),
            Self::Upload(_) | Self::Ip(_) | Self::Persist(_) => true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Preflight(_) => "validation_error",
            Self::Upload(_) => "upload_error",
            Self::Chain(e) => e.kind(),
            Self::Ip(e) => e.kind(),
            Self::Persist(_) => "record_write_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Errors from the orchestrator API itself, as opposed to a step failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MintError {
    #[error("preflight rejected the request: {0}")]
    Preflight(GateError),

    #[error("an identical mint is already in progress")]
    DuplicateSubmission,

    #[error("illegal step transition from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("attempt cannot be retried: {0}")]
    NotRetryable(String),

    #[error("attempt already completed")]
    AlreadyCompleted,

    #[error("mint task aborted: {0}")]
    Aborted(String),
}

impl MintError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Preflight(e) => e.kind(),
            Self::DuplicateSubmission => "duplicate_submission",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::NotRetryable(_) => "not_retryable",
            Self::AlreadyCompleted => "already_completed",
            Self::Aborted(_) => "aborted",
        }
    }
}

impl From<GateError> for MintError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::DuplicateSubmission => Self::DuplicateSubmission,
            other => Self::Preflight(other),
        }
    }
}
