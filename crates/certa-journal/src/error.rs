use std::io;

use crate::intent::{IntentId, IntentState};

/// Errors produced by the intent journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown intent {0}")]
    UnknownIntent(IntentId),

    #[error("intent {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: IntentId,
        from: IntentState,
        to: IntentState,
    },
}

/// Convenience alias used throughout the journal crate.
pub type JournalResult<T> = std::result::Result<T, JournalError>;
