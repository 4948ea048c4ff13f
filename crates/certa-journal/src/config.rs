use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Orphan sweeper configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// A pending intent older than this is treated as abandoned.
    pub stale_after_secs: u64,
    /// Where the file journal lives. `None` keeps intents in memory.
    pub journal_path: Option<PathBuf>,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            stale_after_secs: 15 * 60,
            journal_path: None,
        }
    }
}
