use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minting workflow settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MintingConfig {
    /// How long to wait for a submitted mint to confirm before reporting a
    /// transient failure. The transaction is kept and re-awaited on retry.
    pub confirmation_timeout_secs: u64,
}

impl MintingConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for MintingConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 120,
        }
    }
}
