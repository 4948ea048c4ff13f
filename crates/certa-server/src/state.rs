use std::sync::Arc;

use certa_chain::{SimulatedChain, SimulatedIpRegistrar};
use certa_gate::SubmissionGuard;
use certa_journal::{FileJournal, InMemoryJournal, IntentJournal};
use certa_minting::MintingOrchestrator;
use certa_records::{InMemoryRecordStore, RecordStore};
use certa_registration::RegistrationOrchestrator;
use certa_store::{FsObjectStore, InMemoryObjectStore, ObjectStore, StorageBackend};
use tracing::info;

use crate::config::CertaConfig;
use crate::error::ServerResult;
use crate::registry::MintRegistry;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler can reach.
pub struct AppStateInner {
    pub config: CertaConfig,
    pub objects: Arc<dyn ObjectStore>,
    pub records: Arc<dyn RecordStore>,
    pub journal: Arc<dyn IntentJournal>,
    pub registration: RegistrationOrchestrator,
    pub minting: Arc<MintingOrchestrator>,
    pub mints: MintRegistry,
}

impl AppStateInner {
    /// Wire the backends named by `config` into both orchestrators.
    ///
    /// Records live in memory. The ledger and IP protocol are the simulated
    /// clients, confirming after `chain.simulated_block_time_ms`.
    pub async fn build(config: CertaConfig) -> ServerResult<AppState> {
        let objects: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryObjectStore::with_config(config.storage.clone())),
            StorageBackend::Filesystem => Arc::new(FsObjectStore::open(config.storage.clone()).await?),
        };
        let journal: Arc<dyn IntentJournal> = match &config.sweeper.journal_path {
            Some(path) => Arc::new(FileJournal::open(path)?),
            None => Arc::new(InMemoryJournal::new()),
        };
        let records: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let guard = SubmissionGuard::new();

        let registration = RegistrationOrchestrator::new(
            Arc::clone(&objects),
            Arc::clone(&records),
            Arc::clone(&journal),
            config.registration.clone(),
        )
        .with_gate_config(config.gate.clone())
        .with_guard(guard.clone());

        let minting = MintingOrchestrator::new(
            Arc::clone(&objects),
            Arc::clone(&records),
            Arc::new(SimulatedChain::new(&config.chain)),
            Arc::new(SimulatedIpRegistrar::new()),
            config.minting.clone(),
        )
        .with_gate_config(config.gate.clone())
        .with_guard(guard);

        info!(
            storage = ?config.storage.backend,
            chain_id = config.chain.chain_id,
            durable_journal = config.sweeper.journal_path.is_some(),
            "service state ready"
        );

        let mints = MintRegistry::new(config.server.mint_retention());
        Ok(Arc::new(Self {
            config,
            objects,
            records,
            journal,
            registration,
            minting: Arc::new(minting),
            mints,
        }))
    }
}
