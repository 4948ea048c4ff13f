//! In-process stand-ins for the ledger and the IP protocol.
//!
//! [`SimulatedChain`] behaves like a real RPC client from the caller's point
//! of view: submission returns a handle immediately and the receipt arrives
//! later. In auto mode the receipt is produced after the configured block
//! time; in manual mode the test (or operator) drives each transaction with
//! [`SimulatedChain::confirm`] / [`SimulatedChain::resolve`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use certa_types::{LicenseTerms, UploadFile, WalletAddress};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::ChainConfig;
use crate::error::{ChainError, ChainResult, IpError, IpResult};
use crate::traits::{ChainClient, IpRegistrar};
use crate::types::{IpMetadata, IpRegistration, MintReceipt, TxHandle, TxHash};

type Confirmation = Option<ChainResult<MintReceipt>>;

#[derive(Default)]
struct ChainState {
    pending: HashMap<TxHash, watch::Sender<Confirmation>>,
    submit_failures: VecDeque<ChainError>,
    confirm_failures: VecDeque<ChainError>,
    poll_failures: VecDeque<ChainError>,
    submissions: Vec<(WalletAddress, String)>,
}

/// Simulated certificate ledger.
pub struct SimulatedChain {
    chain_id: u64,
    contract_address: String,
    block_time: Duration,
    auto_confirm: bool,
    next_token: AtomicU64,
    next_block: AtomicU64,
    state: Arc<Mutex<ChainState>>,
}

impl SimulatedChain {
    /// A ledger that confirms every transaction after the configured block
    /// time.
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            contract_address: config.contract_address.clone(),
            block_time: config.block_time(),
            auto_confirm: true,
            next_token: AtomicU64::new(1),
            next_block: AtomicU64::new(1),
            state: Arc::new(Mutex::new(ChainState::default())),
        }
    }

    /// A ledger whose transactions stay pending until driven explicitly.
    pub fn manual(config: &ChainConfig) -> Self {
        Self {
            auto_confirm: false,
            ..Self::new(config)
        }
    }

    /// The next submission fails with `error`.
    pub fn fail_next_submit(&self, error: ChainError) {
        self.state
            .lock()
            .expect("lock poisoned")
            .submit_failures
            .push_back(error);
    }

    /// The next auto-confirmed transaction resolves with `error` instead of a
    /// receipt. Has no effect in manual mode.
    pub fn fail_next_confirmation(&self, error: ChainError) {
        self.state
            .lock()
            .expect("lock poisoned")
            .confirm_failures
            .push_back(error);
    }

    /// The next `await_confirmation` call fails with `error` while the
    /// transaction itself stays pending, like an RPC outage mid-poll.
    pub fn fail_next_poll(&self, error: ChainError) {
        self.state
            .lock()
            .expect("lock poisoned")
            .poll_failures
            .push_back(error);
    }

    /// Resolve a pending transaction with a fresh receipt.
    pub fn confirm(&self, tx: &TxHash) -> Option<MintReceipt> {
        let receipt = self.next_receipt(tx.clone());
        self.resolve(tx, Ok(receipt.clone())).then_some(receipt)
    }

    /// Resolve a pending transaction with an arbitrary outcome. Returns
    /// `false` if the hash is unknown.
    pub fn resolve(&self, tx: &TxHash, outcome: ChainResult<MintReceipt>) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        match state.pending.get(tx) {
            Some(sender) => {
                sender.send_replace(Some(outcome));
                true
            }
            None => false,
        }
    }

    /// Hashes of transactions that have not been resolved yet.
    pub fn unresolved(&self) -> Vec<TxHash> {
        let state = self.state.lock().expect("lock poisoned");
        state
            .pending
            .iter()
            .filter(|(_, s)| s.borrow().is_none())
            .map(|(h, _)| h.clone())
            .collect()
    }

    /// Number of accepted submissions.
    pub fn submission_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").submissions.len()
    }

    /// Metadata URLs of accepted submissions, in order.
    pub fn submitted_metadata_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("lock poisoned")
            .submissions
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }

    fn next_receipt(&self, tx_hash: TxHash) -> MintReceipt {
        MintReceipt {
            tx_hash,
            token_id: self.next_token.fetch_add(1, Ordering::SeqCst).to_string(),
            block_number: self.next_block.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn contract_address(&self) -> &str {
        &self.contract_address
    }

    async fn submit_mint(&self, owner: &WalletAddress, metadata_url: &str) -> ChainResult<TxHandle> {
        let tx_hash = TxHash::random();
        let planned = {
            let mut state = self.state.lock().expect("lock poisoned");
            if let Some(err) = state.submit_failures.pop_front() {
                return Err(err);
            }
            state.submissions.push((*owner, metadata_url.to_string()));
            let (sender, _) = watch::channel(None);
            state.pending.insert(tx_hash.clone(), sender);
            if self.auto_confirm {
                Some(state.confirm_failures.pop_front())
            } else {
                None
            }
        };
        debug!(%tx_hash, owner = %owner, "mint submitted");

        if let Some(failure) = planned {
            let outcome = match failure {
                Some(err) => Err(err),
                None => Ok(self.next_receipt(tx_hash.clone())),
            };
            if self.block_time.is_zero() {
                self.resolve(&tx_hash, outcome);
            } else {
                let state = Arc::clone(&self.state);
                let delay = self.block_time;
                let hash = tx_hash.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(sender) = state.lock().expect("lock poisoned").pending.get(&hash) {
                        sender.send_replace(Some(outcome));
                    }
                });
            }
        }

        Ok(TxHandle {
            tx_hash,
            chain_id: self.chain_id,
            submitted_at: Utc::now(),
        })
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> ChainResult<MintReceipt> {
        let mut rx = {
            let mut state = self.state.lock().expect("lock poisoned");
            if let Some(err) = state.poll_failures.pop_front() {
                debug!(tx = %tx.tx_hash, error = %err, "confirmation poll failed");
                return Err(err);
            }
            state
                .pending
                .get(&tx.tx_hash)
                .map(|s| s.subscribe())
                .ok_or_else(|| ChainError::Transient(format!("unknown transaction {}", tx.tx_hash)))?
        };
        let resolved = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ChainError::Transient("confirmation channel closed".into()))?;
        let outcome = resolved
            .clone()
            .unwrap_or_else(|| Err(ChainError::Transient("confirmation missing".into())));
        if let Ok(receipt) = &outcome {
            info!(tx = %receipt.tx_hash, token_id = %receipt.token_id, "mint confirmed");
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// SimulatedIpRegistrar
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RegistrarState {
    failures: VecDeque<IpError>,
    registrations: Vec<(IpMetadata, LicenseTerms)>,
}

/// Simulated IP registration protocol.
#[derive(Default)]
pub struct SimulatedIpRegistrar {
    state: Mutex<RegistrarState>,
}

impl SimulatedIpRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next registration fails with `error`.
    pub fn fail_next(&self, error: IpError) {
        self.state
            .lock()
            .expect("lock poisoned")
            .failures
            .push_back(error);
    }

    pub fn registration_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").registrations.len()
    }

    /// Metadata and terms of accepted registrations, in order.
    pub fn registrations(&self) -> Vec<(IpMetadata, LicenseTerms)> {
        self.state.lock().expect("lock poisoned").registrations.clone()
    }
}

#[async_trait]
impl IpRegistrar for SimulatedIpRegistrar {
    async fn register(
        &self,
        asset: &UploadFile,
        metadata: &IpMetadata,
        terms: &LicenseTerms,
    ) -> IpResult<IpRegistration> {
        if asset.is_empty() {
            return Err(IpError::Rejected("empty asset".into()));
        }
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        state.registrations.push((metadata.clone(), terms.clone()));
        let ip_id = WalletAddress::from_bytes(rand::random()).to_string();
        debug!(%ip_id, title = %metadata.title, "ip registered");
        Ok(IpRegistration {
            ip_id,
            tx_hash: Some(TxHash::random()),
        })
    }
}
