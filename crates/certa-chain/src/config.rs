use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for the certificate ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub contract_address: String,
    /// How long the simulated ledger takes to include a transaction.
    pub simulated_block_time_ms: u64,
}

impl ChainConfig {
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.simulated_block_time_ms)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1315,
            contract_address: "0x0000000000000000000000000000000000c3a7a0".into(),
            simulated_block_time_ms: 250,
        }
    }
}
