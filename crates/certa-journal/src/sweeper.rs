use std::sync::Arc;

use certa_records::RecordStore;
use certa_store::ObjectStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SweeperConfig;
use crate::error::JournalResult;
use crate::intent::{IntentJournal, IntentState, UploadIntent};

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Intents eligible for cleanup in this pass.
    pub examined: usize,
    /// Intents resolved to `Compensated`.
    pub deleted: usize,
    /// Pending intents whose object an item already references; marked
    /// `Committed` and left in place.
    #[serde(default)]
    pub reconciled: usize,
    /// Intents whose lookup or delete failed; left for the next pass.
    pub failed: usize,
}

/// Deletes objects whose upload never got a committed row.
///
/// Orphaned intents are always eligible. Pending intents are eligible once
/// they are older than [`SweeperConfig::stale_after`], and only when the
/// sweeper can see the record store: the commit mark is written after the
/// item row, so a stale pending intent may belong to a registered item.
/// Without records, pending intents are never touched.
pub struct OrphanSweeper {
    journal: Arc<dyn IntentJournal>,
    store: Arc<dyn ObjectStore>,
    records: Option<Arc<dyn RecordStore>>,
    config: SweeperConfig,
}

impl OrphanSweeper {
    pub fn new(
        journal: Arc<dyn IntentJournal>,
        store: Arc<dyn ObjectStore>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            journal,
            store,
            records: None,
            config,
        }
    }

    /// Check stale pending intents against item rows before deleting.
    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    fn is_eligible(&self, intent: &UploadIntent) -> bool {
        match intent.state {
            IntentState::Orphaned => true,
            IntentState::Pending if self.records.is_some() => {
                let age = Utc::now().signed_duration_since(intent.recorded_at);
                age.to_std().is_ok_and(|age| age >= self.config.stale_after())
            }
            IntentState::Pending | IntentState::Committed | IntentState::Compensated => false,
        }
    }

    /// Run a single pass over outstanding intents.
    pub async fn sweep_once(&self) -> JournalResult<SweepReport> {
        let mut report = SweepReport::default();

        for intent in self.journal.outstanding()? {
            if !self.is_eligible(&intent) {
                continue;
            }
            report.examined += 1;

            if let (IntentState::Pending, Some(records)) = (intent.state, &self.records) {
                match records.item_referencing(intent.bucket, &intent.path).await {
                    Ok(Some(item)) => {
                        self.journal.transition(intent.id, IntentState::Committed)?;
                        report.reconciled += 1;
                        info!(intent = %intent.id, item = %item, path = %intent.path, "pending upload belongs to an item; marked committed");
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        report.failed += 1;
                        warn!(intent = %intent.id, path = %intent.path, error = %e, "item lookup failed; will retry");
                        continue;
                    }
                }
            }

            match self.store.delete(intent.bucket, &intent.path).await {
                Ok(existed) => {
                    self.journal.transition(intent.id, IntentState::Compensated)?;
                    report.deleted += 1;
                    debug!(intent = %intent.id, bucket = intent.bucket.as_str(), path = %intent.path, existed, "orphan removed");
                }
                Err(e) => {
                    if intent.state == IntentState::Pending {
                        self.journal.transition(intent.id, IntentState::Orphaned)?;
                    }
                    report.failed += 1;
                    warn!(intent = %intent.id, path = %intent.path, error = %e, "orphan delete failed; will retry");
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                deleted = report.deleted,
                reconciled = report.reconciled,
                failed = report.failed,
                "orphan sweep complete"
            );
        }
        Ok(report)
    }

    /// Sweep every [`SweeperConfig::interval`] until `shutdown` turns true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "orphan sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("orphan sweeper stopping");
                        break;
                    }
                }
            }
        }
    }
}
