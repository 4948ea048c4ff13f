use serde::{Deserialize, Serialize};

/// Registration workflow settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Points granted per successful registration.
    pub reward_points: u64,
    pub reward_reason: String,
    /// Buffered reward events per subscriber before the slowest lags.
    pub reward_channel_capacity: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            reward_points: 10,
            reward_reason: "item_registration".into(),
            reward_channel_capacity: 64,
        }
    }
}
