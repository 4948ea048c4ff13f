use async_trait::async_trait;
use certa_types::{LicenseTerms, UploadFile, WalletAddress};

use crate::error::{ChainResult, IpResult};
use crate::types::{IpMetadata, IpRegistration, MintReceipt, TxHandle};

/// Client for the ledger that hosts the certificate contract.
///
/// Submission and confirmation are separate calls: `submit_mint` returns as
/// soon as the transaction is broadcast, and `await_confirmation` suspends
/// until the receipt is available. Awaiting the same handle twice must be
/// safe and yield the same receipt.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain the client is connected to.
    fn chain_id(&self) -> u64;

    /// Address of the certificate contract.
    fn contract_address(&self) -> &str;

    /// Broadcast a mint of a certificate token for `owner` whose token URI is
    /// `metadata_url`.
    async fn submit_mint(&self, owner: &WalletAddress, metadata_url: &str) -> ChainResult<TxHandle>;

    /// Wait for the mint to be included and read back its identifiers.
    async fn await_confirmation(&self, tx: &TxHandle) -> ChainResult<MintReceipt>;
}

/// Client for the intellectual-property registration protocol.
#[async_trait]
pub trait IpRegistrar: Send + Sync {
    async fn register(
        &self,
        asset: &UploadFile,
        metadata: &IpMetadata,
        terms: &LicenseTerms,
    ) -> IpResult<IpRegistration>;
}
