use std::sync::Arc;

use certa_gate::{GateConfig, Preflight, PreflightGate, SubmissionGuard, SubmissionKey};
use certa_journal::{IntentId, IntentJournal, IntentState};
use certa_records::RecordStore;
use certa_store::keys::document_key;
use certa_store::ObjectStore;
use certa_types::{
    Bucket, DocumentKind, Item, ItemDocuments, ItemSubmission, ObjectRef, UploadFile,
    WalletAddress,
};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::RegistrationConfig;
use crate::error::RegistrationError;
use crate::reward::RewardEmitter;

/// An object this attempt uploaded, with the intent that covers it.
struct Uploaded {
    object: ObjectRef,
    intent: Option<IntentId>,
}

/// Coordinates the registration saga across object storage and records.
///
/// Dependencies are injected so tests can substitute in-memory fakes with
/// fault injection.
pub struct RegistrationOrchestrator {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    journal: Arc<dyn IntentJournal>,
    gate: PreflightGate,
    guard: SubmissionGuard,
    rewards: RewardEmitter,
}

impl RegistrationOrchestrator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        journal: Arc<dyn IntentJournal>,
        config: RegistrationConfig,
    ) -> Self {
        let rewards = RewardEmitter::new(Arc::clone(&records), &config);
        Self {
            objects,
            records,
            journal,
            gate: PreflightGate::for_registration(GateConfig::default()),
            guard: SubmissionGuard::new(),
            rewards,
        }
    }

    /// Replace the preflight limits.
    pub fn with_gate_config(mut self, config: GateConfig) -> Self {
        self.gate = PreflightGate::for_registration(config);
        self
    }

    /// Share a duplicate-submission guard with other workflows.
    pub fn with_guard(mut self, guard: SubmissionGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn rewards(&self) -> &RewardEmitter {
        &self.rewards
    }

    /// Register an item.
    ///
    /// Returns once the item row is committed. Reward points are granted
    /// afterwards on a background task and never affect the result.
    pub async fn register(
        &self,
        submission: ItemSubmission,
        bill: UploadFile,
        id_document: UploadFile,
        owner: WalletAddress,
    ) -> Result<Item, RegistrationError> {
        self.gate
            .check(&Preflight::new().submission(&submission).documents(&bill, &id_document))?;

        let key = SubmissionKey::registration(owner, &submission, &bill, &id_document);
        let _permit = self.guard.try_acquire(key)?;

        self.records
            .get_user(&owner)
            .await
            .map_err(RegistrationError::RecordLookup)?
            .ok_or(RegistrationError::UserNotFound(owner))?;

        let timestamp_ms = Utc::now().timestamp_millis();

        let bill = self
            .upload(DocumentKind::Bill, Bucket::Proof, &bill, &owner, timestamp_ms)
            .await?;

        let id_document = match self
            .upload(DocumentKind::Id, Bucket::Id, &id_document, &owner, timestamp_ms)
            .await
        {
            Ok(uploaded) => uploaded,
            Err(e) => {
                self.compensate(&bill).await;
                return Err(e);
            }
        };

        let item = Item::new(
            &submission,
            owner,
            ItemDocuments {
                bill: bill.object.clone(),
                id: id_document.object.clone(),
            },
        );

        let item = match self.records.insert_item(item).await {
            Ok(item) => item,
            Err(e) => {
                warn!(owner = %owner, error = %e, "item insert failed; removing uploaded documents");
                tokio::join!(self.compensate(&bill), self.compensate(&id_document));
                return Err(RegistrationError::RecordWrite(e));
            }
        };

        self.resolve(&bill, IntentState::Committed);
        self.resolve(&id_document, IntentState::Committed);
        info!(item = %item.id, owner = %owner, "item registered");

        self.rewards.emit(owner, item.id);
        Ok(item)
    }

    async fn upload(
        &self,
        document: DocumentKind,
        bucket: Bucket,
        file: &UploadFile,
        owner: &WalletAddress,
        timestamp_ms: i64,
    ) -> Result<Uploaded, RegistrationError> {
        let key = document_key(owner, timestamp_ms, &file.file_name);

        let intent = match self.journal.record(bucket, &key) {
            Ok(intent) => Some(intent.id),
            Err(e) => {
                warn!(bucket = bucket.as_str(), path = %key, error = %e, "could not record upload intent");
                None
            }
        };

        match self
            .objects
            .upload(bucket, &key, file.bytes.clone(), &file.content_type)
            .await
        {
            Ok(object) => {
                debug!(document = %document, bucket = bucket.as_str(), path = %object.path, "document uploaded");
                Ok(Uploaded { object, intent })
            }
            Err(source) => {
                // Uploads are all-or-nothing, so there is nothing to clean up.
                if let Some(id) = intent {
                    self.mark(id, IntentState::Compensated);
                }
                Err(RegistrationError::StorageUpload { document, source })
            }
        }
    }

    /// Delete an uploaded object. A failed delete is logged and left to
    /// the orphan sweeper; it never replaces the error being returned.
    async fn compensate(&self, uploaded: &Uploaded) {
        let ObjectRef { bucket, path, .. } = &uploaded.object;
        match self.objects.delete(*bucket, path).await {
            Ok(_) => {
                debug!(bucket = bucket.as_str(), path = %path, "compensating delete");
                self.resolve(uploaded, IntentState::Compensated);
            }
            Err(e) => {
                error!(bucket = bucket.as_str(), path = %path, error = %e, "compensating delete failed; object orphaned");
                self.resolve(uploaded, IntentState::Orphaned);
            }
        }
    }

    fn resolve(&self, uploaded: &Uploaded, state: IntentState) {
        if let Some(id) = uploaded.intent {
            self.mark(id, state);
        }
    }

    fn mark(&self, id: IntentId, state: IntentState) {
        if let Err(e) = self.journal.transition(id, state) {
            warn!(intent = %id, ?state, error = %e, "could not update upload intent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::RewardEvent;
    use bytes::Bytes;
    use certa_journal::{InMemoryJournal, OrphanSweeper, SweeperConfig};
    use certa_records::{InMemoryRecordStore, RecordOp};
    use certa_store::InMemoryObjectStore;
    use certa_types::{ItemStatus, User};

    const OWNER: WalletAddress = WalletAddress::from_bytes([0xaa; 20]);

    struct Harness {
        objects: Arc<InMemoryObjectStore>,
        records: Arc<InMemoryRecordStore>,
        journal: Arc<InMemoryJournal>,
        orchestrator: RegistrationOrchestrator,
    }

    async fn harness() -> Harness {
        let objects = Arc::new(InMemoryObjectStore::new());
        let records = Arc::new(InMemoryRecordStore::new());
        let journal = Arc::new(InMemoryJournal::new());
        records.upsert_user(User::new(OWNER, "Ada")).await.unwrap();
        let orchestrator = RegistrationOrchestrator::new(
            objects.clone(),
            records.clone(),
            journal.clone(),
            RegistrationConfig::default(),
        );
        Harness {
            objects,
            records,
            journal,
            orchestrator,
        }
    }

    fn watch() -> ItemSubmission {
        ItemSubmission::new("Watch", "Jewelry", 500.0).with_brand("Omega")
    }

    fn bill() -> UploadFile {
        UploadFile::new("bill.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.7 bill"))
    }

    fn id_doc() -> UploadFile {
        UploadFile::new("id.png", "image/png", Bytes::from_static(b"\x89PNG id"))
    }

    // -----------------------------------------------------------------------
    // Success path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn registered_documents_exist() {
        let h = harness().await;
        let item = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap();

        assert_eq!(item.status, ItemStatus::PendingVerification);
        assert_eq!(item.title, "Watch");
        let docs = item.documents.as_ref().unwrap();
        assert!(h.objects.exists(Bucket::Proof, &docs.bill.path).await.unwrap());
        assert!(h.objects.exists(Bucket::Id, &docs.id.path).await.unwrap());
        assert!(docs.bill.path.starts_with(&OWNER.to_hex()));
        assert!(docs.bill.path.ends_with("_bill.pdf"));
        assert_eq!(item.bill_url(), Some(docs.bill.url.as_str()));

        let stored = h.records.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(stored, item);
        assert!(h.journal.outstanding().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reward_is_granted_in_background() {
        let h = harness().await;
        let mut events = h.orchestrator.rewards().subscribe();
        let item = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            RewardEvent::Granted {
                entry,
                total_points,
            } => {
                assert_eq!(entry.item, item.id);
                assert_eq!(entry.points, 10);
                assert_eq!(entry.reason, "item_registration");
                assert_eq!(total_points, 10);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(h.records.rewards_for(&OWNER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reward_failure_does_not_change_outcome() {
        let h = harness().await;
        h.records.fail(RecordOp::InsertReward);
        let mut events = h.orchestrator.rewards().subscribe();

        let item = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap();

        assert!(matches!(events.recv().await.unwrap(), RewardEvent::Failed { .. }));
        assert!(h.records.get_item(&item.id).await.unwrap().is_some());
        assert_eq!(h.records.reward_count(), 0);
        assert_eq!(h.records.get_user(&OWNER).await.unwrap().unwrap().reward_points, 0);
    }

    // -----------------------------------------------------------------------
    // Compensation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn insert_failure_removes_both_documents() {
        let h = harness().await;
        h.records.fail(RecordOp::InsertItem);

        let err = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::RecordWrite(_)));
        assert_eq!(err.kind(), "record_write_error");
        assert_eq!(h.objects.upload_count(Bucket::Proof), 1);
        assert_eq!(h.objects.upload_count(Bucket::Id), 1);
        assert!(h.objects.is_empty());
        assert_eq!(h.records.item_count(), 0);
        assert!(h.journal.outstanding().unwrap().is_empty());
    }

    #[tokio::test]
    async fn id_upload_failure_removes_bill() {
        let h = harness().await;
        h.objects.break_bucket(Bucket::Id);

        let err = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::StorageUpload {
                document: DocumentKind::Id,
                ..
            }
        ));
        assert!(h.objects.is_empty());
        assert_eq!(h.records.item_count(), 0);
    }

    #[tokio::test]
    async fn bill_upload_failure_stops_early() {
        let h = harness().await;
        h.objects.fail_next_uploads(Bucket::Proof, 1);

        let err = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::StorageUpload {
                document: DocumentKind::Bill,
                ..
            }
        ));
        assert_eq!(h.objects.upload_count(Bucket::Id), 0);
        assert!(h.journal.outstanding().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_keeps_original_error_and_is_swept() {
        let h = harness().await;
        h.records.fail(RecordOp::InsertItem);
        h.objects.fail_deletes(true);

        let err = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::RecordWrite(_)));
        assert_eq!(h.objects.len(), 2);

        let orphans = h.journal.outstanding().unwrap();
        assert_eq!(orphans.len(), 2);
        assert!(orphans.iter().all(|i| i.state == IntentState::Orphaned));

        h.objects.fail_deletes(false);
        let sweeper = OrphanSweeper::new(h.journal.clone(), h.objects.clone(), SweeperConfig::default());
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.deleted, 2);
        assert!(h.objects.is_empty());
    }

    #[tokio::test]
    async fn lost_commit_mark_does_not_let_the_sweeper_delete_documents() {
        let h = harness().await;
        h.journal.fail_commits(true);
        let item = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap();
        assert_eq!(h.journal.outstanding().unwrap().len(), 2);

        let config = SweeperConfig {
            stale_after_secs: 0,
            ..SweeperConfig::default()
        };
        let sweeper = OrphanSweeper::new(h.journal.clone(), h.objects.clone(), config)
            .with_records(h.records.clone());
        h.journal.fail_commits(false);
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.reconciled, 2);
        assert_eq!(report.deleted, 0);

        let docs = item.documents.as_ref().unwrap();
        assert!(h.objects.exists(Bucket::Proof, &docs.bill.path).await.unwrap());
        assert!(h.objects.exists(Bucket::Id, &docs.id.path).await.unwrap());
        assert!(h.journal.outstanding().unwrap().is_empty());
    }

    #[tokio::test]
    async fn journal_outage_does_not_block_registration() {
        let h = harness().await;
        h.journal.fail_records(true);
        let item = h
            .orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap();
        assert!(item.documents.is_some());
        assert!(h.journal.is_empty());
    }

    // -----------------------------------------------------------------------
    // Preconditions
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_owner_is_rejected_before_upload() {
        let h = harness().await;
        let stranger = WalletAddress::from_bytes([0x01; 20]);
        let err = h
            .orchestrator
            .register(watch(), bill(), id_doc(), stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UserNotFound(w) if w == stranger));
        assert_eq!(h.objects.upload_count(Bucket::Proof), 0);
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected_before_upload() {
        let h = harness().await;
        let err = h
            .orchestrator
            .register(ItemSubmission::new("Watch", "Jewelry", -1.0), bill(), id_doc(), OWNER)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(h.objects.upload_count(Bucket::Proof), 0);
    }

    #[tokio::test]
    async fn concurrent_duplicate_is_refused() {
        let guard = SubmissionGuard::new();
        let h = harness().await;
        let orchestrator = h.orchestrator.with_guard(guard.clone());

        let held = guard
            .try_acquire(SubmissionKey::registration(OWNER, &watch(), &bill(), &id_doc()))
            .unwrap();
        let err = orchestrator
            .register(watch(), bill(), id_doc(), OWNER)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateSubmission));

        drop(held);
        assert!(orchestrator.register(watch(), bill(), id_doc(), OWNER).await.is_ok());
        assert_eq!(guard.in_flight(), 0);
    }
}
