/// Errors produced by the preflight gate and the submission guard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// A stage refused the input.
    #[error("{stage}: {reason}")]
    Rejected { stage: String, reason: String },

    /// The same owner already has this content in flight.
    #[error("an identical submission is already in progress")]
    DuplicateSubmission,

    /// A stage could not evaluate at all.
    #[error("stage error in '{stage}': {message}")]
    StageError { stage: String, message: String },
}

impl GateError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "validation_error",
            Self::DuplicateSubmission => "duplicate_submission",
            Self::StageError { .. } => "preflight_error",
        }
    }
}
