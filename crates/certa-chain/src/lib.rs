//! Remote ledger and IP-protocol boundaries for certa.
//!
//! [`ChainClient`] submits certificate mints and awaits their receipts;
//! [`IpRegistrar`] records intellectual-property rights over content with an
//! independent protocol. Both are traits so the minting workflow can run
//! against the simulated backends in this crate or against real adapters.

pub mod config;
pub mod error;
pub mod simulated;
pub mod traits;
pub mod types;

pub use config::ChainConfig;
pub use error::{ChainError, ChainResult, IpError, IpResult};
pub use simulated::{SimulatedChain, SimulatedIpRegistrar};
pub use traits::{ChainClient, IpRegistrar};
pub use types::{IpMetadata, IpRegistration, MintReceipt, TxHandle, TxHash};
