use std::fmt;

use certa_types::Bucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JournalError, JournalResult};

/// Identifier of an upload intent (UUID v7, so intents sort by age).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentId(uuid::Uuid);

impl IntentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntentId({})", &self.0.to_string()[..8])
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an intent is in its lifecycle.
///
/// ```text
/// Pending ──► Committed
///    │
///    ├──────► Compensated
///    │            ▲
///    └──► Orphaned┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentState {
    /// Upload may have happened; nothing references the object yet.
    Pending,
    /// A committed row references the object. Terminal.
    Committed,
    /// The object has been deleted. Terminal.
    Compensated,
    /// Compensation was attempted and failed; the sweeper owns it now.
    Orphaned,
}

impl IntentState {
    pub fn can_transition_to(self, next: IntentState) -> bool {
        use IntentState::*;
        matches!(
            (self, next),
            (Pending, Committed) | (Pending, Compensated) | (Pending, Orphaned) | (Orphaned, Compensated)
        )
    }

    /// Still needs attention from either the workflow or the sweeper.
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Orphaned)
    }
}

/// A recorded intention to upload one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadIntent {
    pub id: IntentId,
    pub bucket: Bucket,
    pub path: String,
    pub recorded_at: DateTime<Utc>,
    pub state: IntentState,
}

impl UploadIntent {
    pub fn new(bucket: Bucket, path: impl Into<String>) -> Self {
        Self {
            id: IntentId::new(),
            bucket,
            path: path.into(),
            recorded_at: Utc::now(),
            state: IntentState::Pending,
        }
    }

    pub(crate) fn apply(&mut self, next: IntentState) -> JournalResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(JournalError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// One entry in a journal's log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    Recorded(UploadIntent),
    Transition { id: IntentId, state: IntentState },
}

/// Durable record of upload intents.
///
/// Implementations must apply records in order and reject illegal state
/// transitions.
pub trait IntentJournal: Send + Sync {
    /// Record a pending upload of `bucket/path`.
    fn record(&self, bucket: Bucket, path: &str) -> JournalResult<UploadIntent>;

    /// Move an intent to a new state.
    fn transition(&self, id: IntentId, state: IntentState) -> JournalResult<()>;

    /// Look up an intent.
    fn get(&self, id: IntentId) -> JournalResult<Option<UploadIntent>>;

    /// Pending and orphaned intents, oldest first.
    fn outstanding(&self) -> JournalResult<Vec<UploadIntent>>;
}
