use std::sync::Arc;

use certa_chain::{ChainClient, ChainError, IpMetadata, IpRegistrar};
use certa_crypto::ContentHasher;
use certa_gate::{GateConfig, Preflight, PreflightGate, SubmissionGuard, SubmissionKey};
use certa_records::RecordStore;
use certa_store::keys::{asset_key, metadata_key};
use certa_store::ObjectStore;
use certa_types::{Bucket, CertificateLinkage, MintedCertificate};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::attempt::{AttemptId, MintAttempt, MintCanceller, MintRequest, UploadedAsset};
use crate::config::MintingConfig;
use crate::error::{MintError, MintStepError};
use crate::metadata::NftMetadata;
use crate::outcome::{MintFailure, MintOutcome, MintStage};
use crate::step::{ChainPhase, MintStep};

/// A step failed; carries enough to build the terminal state.
type StepResult<T> = Result<T, MintFailure>;

fn fail<T>(stage: MintStage, error: impl Into<MintStepError>) -> StepResult<T> {
    Err(MintFailure::new(stage, error.into()))
}

/// Coordinates the minting saga across object storage, the ledger, the IP
/// protocol and the record store.
pub struct MintingOrchestrator {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    chain: Arc<dyn ChainClient>,
    ip: Arc<dyn IpRegistrar>,
    gate: PreflightGate,
    guard: SubmissionGuard,
    config: MintingConfig,
}

impl MintingOrchestrator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        chain: Arc<dyn ChainClient>,
        ip: Arc<dyn IpRegistrar>,
        config: MintingConfig,
    ) -> Self {
        Self {
            objects,
            records,
            chain,
            ip,
            gate: PreflightGate::for_minting(GateConfig::default()),
            guard: SubmissionGuard::new(),
            config,
        }
    }

    pub fn with_gate_config(mut self, config: GateConfig) -> Self {
        self.gate = PreflightGate::for_minting(config);
        self
    }

    pub fn with_guard(mut self, guard: SubmissionGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Validate a request and open an attempt for it.
    ///
    /// Wallet, asset and item checks run here, before anything is uploaded.
    /// The attempt holds a duplicate-submission permit until it completes
    /// or fails for good.
    pub fn begin(&self, request: MintRequest) -> Result<MintAttempt, MintError> {
        self.gate.check(
            &Preflight::new()
                .wallet(&request.wallet)
                .asset(&request.asset)
                .submission(&request.submission)
                .license(&request.license),
        )?;
        let key = SubmissionKey::mint(request.owner(), &request.asset, request.mode.as_str());
        let permit = self.guard.try_acquire(key)?;
        let attempt = MintAttempt::new(request, Some(permit));
        info!(attempt = %attempt.id(), mode = %attempt.request().mode, "mint attempt opened");
        Ok(attempt)
    }

    /// Drive an attempt to a terminal step.
    ///
    /// Running a failed attempt again retries it, provided the failure is
    /// retryable. Sub-steps recorded in the attempt's progress are skipped.
    /// Step failures are reported in the returned outcome; `Err` means the
    /// attempt could not be run at all.
    pub async fn run(&self, attempt: &mut MintAttempt) -> Result<MintOutcome, MintError> {
        attempt.begin_run()?;
        if attempt.runs() > 1 {
            info!(attempt = %attempt.id(), run = attempt.runs(), "retrying mint attempt");
        }

        let outcome = match self.drive(attempt).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(
                    attempt = %attempt.id(),
                    stage = %failure.stage,
                    error = %failure.error,
                    retryable = failure.is_retryable(),
                    "mint step failed"
                );
                let outcome = match (&failure.error, &attempt.progress.certificate) {
                    (MintStepError::Ip(ip_error), Some(certificate)) => MintOutcome::Partial {
                        certificate: Some(certificate.clone()),
                        ip_error: ip_error.clone(),
                    },
                    _ => MintOutcome::Failed(failure.clone()),
                };
                attempt.transition(MintStep::Failed(failure))?;
                outcome
            }
        };
        Ok(attempt.finish(outcome))
    }

    /// Run an attempt on its own task.
    pub fn spawn(self: &Arc<Self>, mut attempt: MintAttempt) -> MintHandle {
        let id = attempt.id();
        let steps = attempt.subscribe();
        let canceller = attempt.canceller();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = this.run(&mut attempt).await;
            (attempt, result)
        });
        MintHandle {
            id,
            steps,
            canceller,
            task,
        }
    }

    async fn drive(&self, attempt: &mut MintAttempt) -> Result<MintOutcome, MintFailure> {
        let mode = attempt.request().mode;

        if attempt.is_cancelled() {
            return fail(MintStage::Uploading, MintStepError::Cancelled);
        }
        self.step(attempt, MintStep::Uploading)?;
        let uploaded = match attempt.progress.uploaded.clone() {
            Some(uploaded) => {
                debug!(attempt = %attempt.id(), url = %uploaded.asset.url, "reusing uploaded asset");
                uploaded
            }
            None => {
                let uploaded = self.upload(attempt.request()).await?;
                attempt.progress.uploaded = Some(uploaded.clone());
                uploaded
            }
        };

        if mode.includes_mint() {
            self.mint(attempt, &uploaded).await?;
            self.persist_certificate(attempt, &uploaded).await?;
        }

        if mode.includes_ip() {
            self.register_ip(attempt, &uploaded).await?;
            self.persist_ip(attempt).await?;
        }

        self.step(attempt, MintStep::Completed)?;
        info!(attempt = %attempt.id(), mode = %mode, "mint attempt completed");
        Ok(MintOutcome::Completed {
            certificate: attempt.progress.certificate.clone(),
            ip: attempt.progress.ip.clone(),
        })
    }

    fn step(&self, attempt: &mut MintAttempt, next: MintStep) -> StepResult<()> {
        let stage = attempt.step().stage();
        attempt
            .transition(next)
            .or_else(|e| fail(stage, MintStepError::Internal(e.to_string())))
    }

    // ---- uploading ----

    async fn upload(&self, request: &MintRequest) -> StepResult<UploadedAsset> {
        let asset = &request.asset;
        let digest = ContentHasher::ASSET.hash(&asset.bytes);
        let key = asset_key(&digest.to_hex(), asset.extension().as_deref());

        let asset_ref = self
            .objects
            .upload(Bucket::Asset, &key, asset.bytes.clone(), &asset.content_type)
            .await
            .or_else(|e| fail(MintStage::Uploading, MintStepError::Upload(e.to_string())))?;

        let document = NftMetadata::build(&request.submission, &asset_ref.url, &request.license)
            .to_json_bytes()
            .or_else(|e| fail(MintStage::Uploading, MintStepError::Upload(e.to_string())))?;
        let metadata_key = metadata_key(&ContentHasher::ASSET.hash(&document).to_hex());
        let metadata_ref = self
            .objects
            .upload(Bucket::Asset, &metadata_key, document.into(), "application/json")
            .await
            .or_else(|e| fail(MintStage::Uploading, MintStepError::Upload(e.to_string())))?;

        debug!(asset = %asset_ref.url, metadata = %metadata_ref.url, "certificate asset uploaded");
        Ok(UploadedAsset {
            asset: asset_ref,
            metadata: metadata_ref,
            content_hash: digest.to_hex(),
        })
    }

    // ---- minting on chain ----

    async fn mint(&self, attempt: &mut MintAttempt, uploaded: &UploadedAsset) -> StepResult<()> {
        if let Some(receipt) = &attempt.progress.receipt {
            let tx = receipt.tx_hash.clone();
            return self.step(attempt, MintStep::MintingOnChain(ChainPhase::Confirmed { tx }));
        }

        let handle = match attempt.progress.pending_tx.clone() {
            Some(handle) => {
                debug!(attempt = %attempt.id(), tx = %handle.tx_hash, "re-awaiting pending transaction");
                let tx = handle.tx_hash.clone();
                self.step(attempt, MintStep::MintingOnChain(ChainPhase::Submitted { tx }))?;
                handle
            }
            None => {
                if attempt.is_cancelled() {
                    return fail(MintStage::MintingOnChain, MintStepError::Cancelled);
                }
                self.step(attempt, MintStep::MintingOnChain(ChainPhase::Submitting))?;
                let owner = attempt.request().owner();
                let handle = self
                    .chain
                    .submit_mint(&owner, &uploaded.metadata.url)
                    .await
                    .or_else(|e| fail(MintStage::MintingOnChain, e))?;
                attempt.progress.pending_tx = Some(handle.clone());
                let tx = handle.tx_hash.clone();
                self.step(attempt, MintStep::MintingOnChain(ChainPhase::Submitted { tx }))?;
                handle
            }
        };

        let timeout = self.config.confirmation_timeout();
        let confirmation = tokio::time::timeout(timeout, self.chain.await_confirmation(&handle)).await;
        if attempt.is_cancelled() {
            info!(attempt = %attempt.id(), tx = %handle.tx_hash, "cancel requested after broadcast; continuing");
        }

        let receipt = match confirmation {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                // Only a dead transaction is resubmitted; otherwise the retry
                // waits on the same hash.
                if e.ends_transaction() {
                    attempt.progress.pending_tx = None;
                }
                return fail(MintStage::MintingOnChain, e);
            }
            Err(_) => {
                return fail(
                    MintStage::MintingOnChain,
                    ChainError::Transient(format!(
                        "no confirmation for {} within {}s",
                        handle.tx_hash,
                        timeout.as_secs()
                    )),
                );
            }
        };

        attempt.progress.pending_tx = None;
        attempt.progress.receipt = Some(receipt.clone());
        self.step(
            attempt,
            MintStep::MintingOnChain(ChainPhase::Confirmed { tx: receipt.tx_hash }),
        )
    }

    async fn persist_certificate(&self, attempt: &mut MintAttempt, uploaded: &UploadedAsset) -> StepResult<()> {
        let request = attempt.request();
        let (owner, item, license) = (request.owner(), request.item, request.license.clone());

        if attempt.progress.certificate.is_none() {
            let Some(receipt) = attempt.progress.receipt.as_ref() else {
                return fail(MintStage::Finalizing, MintStepError::Persist("no receipt".into()));
            };
            let certificate = MintedCertificate::completed(
                owner,
                item,
                receipt.token_id.clone(),
                self.chain.contract_address(),
                receipt.tx_hash.as_str(),
                uploaded.asset.url.clone(),
                uploaded.metadata.url.clone(),
                license,
            );
            let certificate = self
                .records
                .insert_certificate(certificate)
                .await
                .or_else(|e| fail(MintStage::Finalizing, MintStepError::Persist(e.to_string())))?;
            info!(certificate = %certificate.id, token_id = ?certificate.token_id, "certificate recorded");
            attempt.progress.certificate = Some(certificate);
        }

        if let (Some(item), false) = (item, attempt.progress.item_linked) {
            let linkage = CertificateLinkage {
                nft_asset_url: Some(uploaded.asset.url.clone()),
                nft_metadata_url: Some(uploaded.metadata.url.clone()),
                certificate_id: attempt.progress.certificate.as_ref().map(|c| c.id),
                ip_id: None,
            };
            self.records
                .attach_linkage(&item, linkage)
                .await
                .or_else(|e| fail(MintStage::Finalizing, MintStepError::Persist(e.to_string())))?;
            attempt.progress.item_linked = true;
        }
        Ok(())
    }

    // ---- registering ip ----

    async fn register_ip(&self, attempt: &mut MintAttempt, uploaded: &UploadedAsset) -> StepResult<()> {
        if attempt.progress.ip.is_some() {
            return self.step(attempt, MintStep::RegisteringIp);
        }
        if attempt.is_cancelled() {
            if attempt.progress.receipt.is_none() {
                return fail(MintStage::RegisteringIp, MintStepError::Cancelled);
            }
            info!(attempt = %attempt.id(), "cancel requested after mint; registering ip anyway");
        }
        self.step(attempt, MintStep::RegisteringIp)?;

        let request = attempt.request();
        let metadata = IpMetadata {
            title: request.submission.title.trim().to_string(),
            description: request.submission.description.clone(),
            owner: request.owner(),
            asset_url: uploaded.asset.url.clone(),
            metadata_url: uploaded.metadata.url.clone(),
            content_hash: uploaded.content_hash.clone(),
        };
        let registration = self
            .ip
            .register(&request.asset, &metadata, &request.license)
            .await
            .or_else(|e| fail(MintStage::RegisteringIp, e))?;
        info!(attempt = %attempt.id(), ip_id = %registration.ip_id, "ip registered");
        attempt.progress.ip = Some(registration);
        Ok(())
    }

    async fn persist_ip(&self, attempt: &mut MintAttempt) -> StepResult<()> {
        if attempt.progress.ip_linked {
            return Ok(());
        }
        let Some(ip_id) = attempt.progress.ip.as_ref().map(|ip| ip.ip_id.clone()) else {
            return Ok(());
        };

        if let Some(certificate) = &attempt.progress.certificate {
            let mut updated = certificate.clone();
            updated.ip_id = Some(ip_id.clone());
            let updated = self
                .records
                .update_certificate(updated)
                .await
                .or_else(|e| fail(MintStage::Finalizing, MintStepError::Persist(e.to_string())))?;
            attempt.progress.certificate = Some(updated);
        }

        if let Some(item) = attempt.request().item {
            let linkage = CertificateLinkage {
                ip_id: Some(ip_id),
                ..CertificateLinkage::default()
            };
            self.records
                .attach_linkage(&item, linkage)
                .await
                .or_else(|e| fail(MintStage::Finalizing, MintStepError::Persist(e.to_string())))?;
        }
        attempt.progress.ip_linked = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MintHandle
// ---------------------------------------------------------------------------

/// A running attempt.
pub struct MintHandle {
    id: AttemptId,
    steps: watch::Receiver<MintStep>,
    canceller: MintCanceller,
    task: JoinHandle<(MintAttempt, Result<MintOutcome, MintError>)>,
}

impl MintHandle {
    pub fn id(&self) -> AttemptId {
        self.id
    }

    /// The step stream.
    pub fn steps(&self) -> watch::Receiver<MintStep> {
        self.steps.clone()
    }

    pub fn current_step(&self) -> MintStep {
        self.steps.borrow().clone()
    }

    /// Request cancellation; see [`MintCanceller`] for when it applies.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Wait for the run to finish and get the attempt back, for inspection
    /// or another run.
    pub async fn join(self) -> Result<(MintAttempt, MintOutcome), MintError> {
        let (attempt, result) = self
            .task
            .await
            .map_err(|e| MintError::Aborted(e.to_string()))?;
        Ok((attempt, result?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::MintMode;
    use bytes::Bytes;
    use certa_chain::{ChainConfig, IpError, SimulatedChain, SimulatedIpRegistrar};
    use certa_gate::WalletSession;
    use certa_records::{InMemoryRecordStore, RecordOp};
    use certa_store::InMemoryObjectStore;
    use certa_types::{Item, ItemDocuments, ItemSubmission, MintStatus, ObjectRef, UploadFile, User, WalletAddress};

    const OWNER: WalletAddress = WalletAddress::from_bytes([0xbb; 20]);

    struct Harness {
        objects: Arc<InMemoryObjectStore>,
        records: Arc<InMemoryRecordStore>,
        chain: Arc<SimulatedChain>,
        ip: Arc<SimulatedIpRegistrar>,
        orchestrator: Arc<MintingOrchestrator>,
    }

    fn harness_with(chain: SimulatedChain, config: MintingConfig) -> Harness {
        let objects = Arc::new(InMemoryObjectStore::new());
        let records = Arc::new(InMemoryRecordStore::new());
        let chain = Arc::new(chain);
        let ip = Arc::new(SimulatedIpRegistrar::new());
        let orchestrator = Arc::new(MintingOrchestrator::new(
            objects.clone(),
            records.clone(),
            chain.clone(),
            ip.clone(),
            config,
        ));
        Harness {
            objects,
            records,
            chain,
            ip,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        let config = ChainConfig {
            simulated_block_time_ms: 0,
            ..ChainConfig::default()
        };
        harness_with(SimulatedChain::new(&config), MintingConfig::default())
    }

    fn request(mode: MintMode) -> MintRequest {
        MintRequest::new(
            UploadFile::new("asset.png", "image/png", Bytes::from_static(b"\x89PNG certificate art")),
            ItemSubmission::new("Watch", "Jewelry", 500.0),
            WalletSession::connected(OWNER, 1315),
            mode,
        )
    }

    async fn registered_item(records: &InMemoryRecordStore) -> Item {
        records.upsert_user(User::new(OWNER, "Bo")).await.unwrap();
        let doc = |bucket, path: &str| ObjectRef {
            bucket,
            path: path.into(),
            url: format!("http://x/{path}"),
        };
        let item = Item::new(
            &ItemSubmission::new("Watch", "Jewelry", 500.0),
            OWNER,
            ItemDocuments {
                bill: doc(Bucket::Proof, "b"),
                id: doc(Bucket::Id, "i"),
            },
        );
        records.insert_item(item).await.unwrap()
    }

    // -----------------------------------------------------------------------
    // Happy paths
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn mint_only_completes_and_records_certificate() {
        let h = harness();
        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let outcome = h.orchestrator.run(&mut attempt).await.unwrap();

        let MintOutcome::Completed { certificate: Some(cert), ip: None } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(cert.status, MintStatus::Completed);
        assert!(cert.tx_hash.is_some());
        assert_eq!(cert.owner, OWNER);
        assert_eq!(h.records.certificate_count(), 1);
        assert_eq!(*attempt.step(), MintStep::Completed);

        let uploaded = attempt.progress().uploaded.clone().unwrap();
        assert!(uploaded.asset.path.ends_with(".png"));
        assert!(uploaded.metadata.path.ends_with(".json"));
        assert_eq!(h.chain.submitted_metadata_urls(), vec![uploaded.metadata.url]);
        assert_eq!(h.objects.upload_count(Bucket::Asset), 2);
    }

    #[tokio::test]
    async fn mint_and_ip_links_item() {
        let h = harness();
        let item = registered_item(&h.records).await;
        let mut attempt = h
            .orchestrator
            .begin(request(MintMode::MintAndIp).for_item(item.id))
            .unwrap();
        let outcome = h.orchestrator.run(&mut attempt).await.unwrap();

        let MintOutcome::Completed { certificate: Some(cert), ip: Some(ip) } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(cert.ip_id.as_deref(), Some(ip.ip_id.as_str()));
        assert_eq!(cert.item, Some(item.id));

        let stored = h.records.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.linkage.certificate_id, Some(cert.id));
        assert_eq!(stored.linkage.ip_id, Some(ip.ip_id));
        assert_eq!(stored.linkage.nft_asset_url.as_deref(), Some(cert.asset_url.as_str()));
        assert_eq!(h.records.certificate_count(), 1);
    }

    #[tokio::test]
    async fn ip_only_has_no_certificate() {
        let h = harness();
        let mut attempt = h.orchestrator.begin(request(MintMode::IpOnly)).unwrap();
        let outcome = h.orchestrator.run(&mut attempt).await.unwrap();

        assert!(matches!(outcome, MintOutcome::Completed { certificate: None, ip: Some(_) }));
        assert_eq!(h.chain.submission_count(), 0);
        assert_eq!(h.records.certificate_count(), 0);
        assert_eq!(h.ip.registration_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Chain failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn user_rejection_after_submit_is_terminal() {
        let h = harness();
        h.chain
            .fail_next_confirmation(ChainError::UserRejected("signature declined".into()));

        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let outcome = h.orchestrator.run(&mut attempt).await.unwrap();

        let MintOutcome::Failed(failure) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(failure.stage, MintStage::MintingOnChain);
        assert!(matches!(failure.error, MintStepError::Chain(ChainError::UserRejected(_))));
        assert!(!failure.is_retryable());

        let uploaded = attempt.progress().uploaded.clone().unwrap();
        assert!(h.objects.exists(Bucket::Asset, &uploaded.asset.path).await.unwrap());
        assert_eq!(h.records.certificate_count(), 0);
        assert!(matches!(h.orchestrator.run(&mut attempt).await, Err(MintError::NotRetryable(_))));
    }

    #[tokio::test]
    async fn transient_failure_retries_without_reupload() {
        let h = harness();
        h.chain.fail_next_submit(ChainError::Transient("rpc timeout".into()));

        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let first = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(matches!(&first, MintOutcome::Failed(f) if f.is_retryable()));
        let url = attempt.progress().uploaded.clone().unwrap().asset.url;

        let second = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(second.is_completed());
        assert_eq!(h.objects.upload_count(Bucket::Asset), 2);
        assert_eq!(second.certificate().unwrap().asset_url, url);
        assert_eq!(attempt.runs(), 2);
    }

    #[tokio::test]
    async fn confirmation_timeout_keeps_pending_tx() {
        let config = MintingConfig {
            confirmation_timeout_secs: 0,
        };
        let h = harness_with(SimulatedChain::manual(&ChainConfig::default()), config);

        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let first = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(matches!(
            &first,
            MintOutcome::Failed(MintFailure { error: MintStepError::Chain(ChainError::Transient(_)), .. })
        ));
        let pending = attempt.progress().pending_tx.clone().unwrap();

        h.chain.confirm(&pending.tx_hash).unwrap();
        let second = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(second.is_completed());
        assert_eq!(h.chain.submission_count(), 1);
        assert_eq!(
            second.certificate().unwrap().tx_hash.as_deref(),
            Some(pending.tx_hash.as_str())
        );
    }

    #[tokio::test]
    async fn transient_confirmation_error_does_not_resubmit() {
        let h = harness();
        h.chain.fail_next_poll(ChainError::Transient("rpc 502 while polling receipt".into()));

        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let first = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(matches!(&first, MintOutcome::Failed(f) if f.is_retryable()));
        let pending = attempt.progress().pending_tx.clone().unwrap();

        let second = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(second.is_completed());
        assert_eq!(h.chain.submission_count(), 1);
        assert_eq!(
            second.certificate().unwrap().tx_hash.as_deref(),
            Some(pending.tx_hash.as_str())
        );
    }

    #[tokio::test]
    async fn illegal_step_is_an_internal_failure() {
        let h = harness();
        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();

        let failure = h.orchestrator.step(&mut attempt, MintStep::Completed).unwrap_err();
        assert_eq!(failure.stage, MintStage::Uploading);
        assert!(matches!(failure.error, MintStepError::Internal(_)));
        assert_eq!(failure.error.kind(), "internal_error");
        assert!(!failure.is_retryable());
        assert_eq!(attempt.step(), &MintStep::Idle);
    }

    #[tokio::test]
    async fn reverted_transaction_is_resubmitted() {
        let h = harness();
        h.chain.fail_next_confirmation(ChainError::Reverted("out of gas".into()));

        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let first = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(matches!(&first, MintOutcome::Failed(f) if f.is_retryable()));
        assert!(attempt.progress().pending_tx.is_none());

        let second = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(second.is_completed());
        assert_eq!(h.chain.submission_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Partial success
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn ip_failure_after_mint_is_partial() {
        let h = harness();
        let item = registered_item(&h.records).await;
        h.ip.fail_next(IpError::Unavailable("gateway down".into()));

        let mut attempt = h
            .orchestrator
            .begin(request(MintMode::MintAndIp).for_item(item.id))
            .unwrap();
        let outcome = h.orchestrator.run(&mut attempt).await.unwrap();

        let MintOutcome::Partial { certificate: Some(cert), ip_error } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(ip_error, IpError::Unavailable("gateway down".into()));
        assert!(cert.tx_hash.is_some());
        assert!(matches!(attempt.step(), MintStep::Failed(f) if f.stage == MintStage::RegisteringIp));

        // Retry runs only the ip step and updates the same certificate.
        let retried = h.orchestrator.run(&mut attempt).await.unwrap();
        let MintOutcome::Completed { certificate: Some(updated), ip: Some(ip) } = retried else {
            panic!("unexpected outcome: {retried:?}");
        };
        assert_eq!(updated.id, cert.id);
        assert_eq!(updated.ip_id, Some(ip.ip_id.clone()));
        assert_eq!(h.chain.submission_count(), 1);
        assert_eq!(h.records.certificate_count(), 1);
        let stored = h.records.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.linkage.certificate_id, Some(cert.id));
        assert_eq!(stored.linkage.ip_id, Some(ip.ip_id));
    }

    #[tokio::test]
    async fn ip_only_failure_is_total() {
        let h = harness();
        h.ip.fail_next(IpError::Rejected("duplicate content".into()));
        let mut attempt = h.orchestrator.begin(request(MintMode::IpOnly)).unwrap();
        let outcome = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(matches!(outcome, MintOutcome::Failed(MintFailure { stage: MintStage::RegisteringIp, .. })));
    }

    #[tokio::test]
    async fn persist_failure_does_not_remint() {
        let h = harness();
        h.records.fail_next(RecordOp::InsertCertificate, 1);

        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let first = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(matches!(&first, MintOutcome::Failed(f) if f.stage == MintStage::Finalizing));
        assert!(attempt.progress().receipt.is_some());

        let second = h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(second.is_completed());
        assert_eq!(h.chain.submission_count(), 1);
        assert_eq!(h.records.certificate_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Preflight, guard and cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn wrong_chain_fails_before_upload() {
        let h = harness();
        let mut req = request(MintMode::MintOnly);
        req.wallet = WalletSession::connected(OWNER, 1);
        let err = h.orchestrator.begin(req).unwrap_err();
        assert!(matches!(err, MintError::Preflight(_)));
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(h.objects.upload_count(Bucket::Asset), 0);
    }

    #[tokio::test]
    async fn duplicate_attempt_is_refused_while_open() {
        let h = harness();
        let first = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        assert_eq!(
            h.orchestrator.begin(request(MintMode::MintOnly)).unwrap_err(),
            MintError::DuplicateSubmission
        );
        assert!(h.orchestrator.begin(request(MintMode::IpOnly)).is_ok());
        drop(first);
        assert!(h.orchestrator.begin(request(MintMode::MintOnly)).is_ok());
    }

    #[tokio::test]
    async fn completed_attempt_releases_guard() {
        let h = harness();
        let mut attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        h.orchestrator.run(&mut attempt).await.unwrap();
        assert!(h.orchestrator.begin(request(MintMode::MintOnly)).is_ok());
        assert!(matches!(h.orchestrator.run(&mut attempt).await, Err(MintError::AlreadyCompleted)));
    }

    #[tokio::test]
    async fn cancel_before_submit_is_terminal() {
        let h = harness();
        let attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        attempt.canceller().cancel();
        let handle = h.orchestrator.spawn(attempt);
        let (attempt, outcome) = handle.join().await.unwrap();

        assert!(matches!(
            outcome,
            MintOutcome::Failed(MintFailure { error: MintStepError::Cancelled, .. })
        ));
        assert_eq!(h.objects.upload_count(Bucket::Asset), 0);
        assert!(attempt.step().is_terminal());
    }

    #[tokio::test]
    async fn cancel_after_submit_is_advisory() {
        let h = harness_with(SimulatedChain::manual(&ChainConfig::default()), MintingConfig::default());
        let attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let handle = h.orchestrator.spawn(attempt);

        let mut steps = handle.steps();
        steps
            .wait_for(|s| matches!(s, MintStep::MintingOnChain(ChainPhase::Submitted { .. })))
            .await
            .unwrap();
        handle.cancel();
        let tx = h.chain.unresolved().pop().unwrap();
        h.chain.confirm(&tx).unwrap();

        let (_, outcome) = handle.join().await.unwrap();
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn step_stream_reports_progress() {
        let h = harness_with(SimulatedChain::manual(&ChainConfig::default()), MintingConfig::default());
        let attempt = h.orchestrator.begin(request(MintMode::MintOnly)).unwrap();
        let handle = h.orchestrator.spawn(attempt);

        let mut steps = handle.steps();
        let submitted = steps
            .wait_for(|s| matches!(s, MintStep::MintingOnChain(ChainPhase::Submitted { .. })))
            .await
            .unwrap()
            .clone();
        let MintStep::MintingOnChain(phase) = submitted else { unreachable!() };
        let tx = phase.tx().cloned().unwrap();
        h.chain.confirm(&tx).unwrap();

        steps.wait_for(MintStep::is_terminal).await.unwrap();
        assert_eq!(handle.current_step(), MintStep::Completed);
        handle.join().await.unwrap();
    }
}
