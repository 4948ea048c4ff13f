use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use certa_minting::{AttemptId, MintAttempt, MintCanceller, MintMode, MintStep, MintingOrchestrator};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};
use crate::view::{MintStatusView, OutcomeView, StepView};

/// An attempt known to the server.
///
/// The attempt itself sits behind an async mutex that a run holds for its
/// whole duration; readers use the step stream and only look at the attempt
/// when no run is in progress.
pub struct MintEntry {
    id: AttemptId,
    mode: MintMode,
    steps: watch::Receiver<MintStep>,
    canceller: MintCanceller,
    attempt: Arc<Mutex<MintAttempt>>,
    /// When the last run ended; `None` while a run is in progress.
    finished_at: RwLock<Option<Instant>>,
}

impl MintEntry {
    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn current_step(&self) -> MintStep {
        self.steps.borrow().clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    fn finish(&self) {
        *self.finished_at.write().expect("mint entry lock poisoned") = Some(Instant::now());
    }

    fn restart(&self) {
        *self.finished_at.write().expect("mint entry lock poisoned") = None;
    }

    /// Finished longer than `retention` ago and not running again.
    fn is_expired(&self, retention: Duration) -> bool {
        let finished = *self.finished_at.read().expect("mint entry lock poisoned");
        finished.is_some_and(|at| at.elapsed() >= retention) && self.attempt.try_lock().is_ok()
    }

    pub fn status(&self) -> MintStatusView {
        let step = self.current_step();
        let (runs, outcome) = match self.attempt.try_lock() {
            Ok(attempt) => (Some(attempt.runs()), attempt.outcome().map(OutcomeView::from)),
            Err(_) => (None, None),
        };
        MintStatusView {
            attempt_id: self.id,
            mode: self.mode,
            step: StepView::from(&step),
            runs,
            outcome,
        }
    }
}

/// Attempts by id.
///
/// An attempt holds its asset bytes, so finished attempts are dropped once
/// they have been idle for the retention period. Eviction runs whenever a
/// new attempt is tracked.
pub struct MintRegistry {
    entries: RwLock<HashMap<AttemptId, Arc<MintEntry>>>,
    retention: Duration,
}

impl MintRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("mint registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &AttemptId) -> ServerResult<Arc<MintEntry>> {
        self.entries
            .read()
            .expect("mint registry lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("mint attempt {id}")))
    }

    /// Track a new attempt and start its first run in the background.
    pub fn start(&self, orchestrator: Arc<MintingOrchestrator>, attempt: MintAttempt) -> ServerResult<Arc<MintEntry>> {
        let entry = Arc::new(MintEntry {
            id: attempt.id(),
            mode: attempt.request().mode,
            steps: attempt.subscribe(),
            canceller: attempt.canceller(),
            attempt: Arc::new(Mutex::new(attempt)),
            finished_at: RwLock::new(None),
        });
        let guard = lock_idle(&entry)?;
        self.evict_expired();
        self.entries
            .write()
            .expect("mint registry lock poisoned")
            .insert(entry.id, Arc::clone(&entry));
        spawn_run(orchestrator, Arc::clone(&entry), guard);
        Ok(entry)
    }

    /// Drop attempts that finished more than the retention period ago.
    /// Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().expect("mint registry lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.retention));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "finished mint attempts evicted");
        }
        evicted
    }

    /// Run a failed attempt again. Refused while a run is in progress or
    /// when the failure is not retryable.
    pub fn retry(&self, orchestrator: Arc<MintingOrchestrator>, id: &AttemptId) -> ServerResult<Arc<MintEntry>> {
        let entry = self.get(id)?;
        let guard = lock_idle(&entry)?;
        guard.check_runnable()?;
        spawn_run(orchestrator, Arc::clone(&entry), guard);
        Ok(entry)
    }
}

fn lock_idle(entry: &MintEntry) -> ServerResult<OwnedMutexGuard<MintAttempt>> {
    Arc::clone(&entry.attempt)
        .try_lock_owned()
        .map_err(|_| ServerError::Busy(format!("mint attempt {} is running", entry.id)))
}

fn spawn_run(
    orchestrator: Arc<MintingOrchestrator>,
    entry: Arc<MintEntry>,
    mut attempt: OwnedMutexGuard<MintAttempt>,
) {
    entry.restart();
    tokio::spawn(async move {
        match orchestrator.run(&mut attempt).await {
            Ok(outcome) => debug!(attempt = %attempt.id(), outcome = outcome.name(), "mint run finished"),
            Err(e) => warn!(attempt = %attempt.id(), error = %e, "mint run refused"),
        }
        entry.finish();
    });
}
