use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use certa_types::Bucket;

use crate::error::{JournalError, JournalResult};
use crate::intent::{IntentId, IntentJournal, IntentState, JournalRecord, UploadIntent};

/// Folded view of a journal's records.
#[derive(Debug, Default)]
pub(crate) struct IntentIndex {
    intents: HashMap<IntentId, UploadIntent>,
}

impl IntentIndex {
    /// Apply one record. Transitions on unknown ids are errors.
    pub(crate) fn apply(&mut self, record: &JournalRecord) -> JournalResult<()> {
        match record {
            JournalRecord::Recorded(intent) => {
                self.intents.insert(intent.id, intent.clone());
                Ok(())
            }
            JournalRecord::Transition { id, state } => self
                .intents
                .get_mut(id)
                .ok_or(JournalError::UnknownIntent(*id))?
                .apply(*state),
        }
    }

    /// Check that `record` would apply cleanly, without applying it.
    pub(crate) fn check(&self, record: &JournalRecord) -> JournalResult<()> {
        if let JournalRecord::Transition { id, state } = record {
            let intent = self.intents.get(id).ok_or(JournalError::UnknownIntent(*id))?;
            if !intent.state.can_transition_to(*state) {
                return Err(JournalError::InvalidTransition {
                    id: *id,
                    from: intent.state,
                    to: *state,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: &IntentId) -> Option<UploadIntent> {
        self.intents.get(id).cloned()
    }

    pub(crate) fn outstanding(&self) -> Vec<UploadIntent> {
        let mut out: Vec<_> = self
            .intents
            .values()
            .filter(|i| i.state.is_outstanding())
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.intents.len()
    }
}

/// Process-local intent journal.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    index: RwLock<IntentIndex>,
    fail_records: AtomicBool,
    fail_commits: AtomicBool,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record` call fail until turned off.
    pub fn fail_records(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent transition to `Committed` fail until turned off.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of intents ever recorded.
    pub fn len(&self) -> usize {
        self.index.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntentJournal for InMemoryJournal {
    fn record(&self, bucket: Bucket, path: &str) -> JournalResult<UploadIntent> {
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(JournalError::Io(std::io::Error::other("injected journal failure")));
        }
        let intent = UploadIntent::new(bucket, path);
        self.index
            .write()
            .expect("lock poisoned")
            .apply(&JournalRecord::Recorded(intent.clone()))?;
        Ok(intent)
    }

    fn transition(&self, id: IntentId, state: IntentState) -> JournalResult<()> {
        if state == IntentState::Committed && self.fail_commits.load(Ordering::SeqCst) {
            return Err(JournalError::Io(std::io::Error::other("injected journal failure")));
        }
        self.index
            .write()
            .expect("lock poisoned")
            .apply(&JournalRecord::Transition { id, state })
    }

    fn get(&self, id: IntentId) -> JournalResult<Option<UploadIntent>> {
        Ok(self.index.read().expect("lock poisoned").get(&id))
    }

    fn outstanding(&self) -> JournalResult<Vec<UploadIntent>> {
        Ok(self.index.read().expect("lock poisoned").outstanding())
    }
}
