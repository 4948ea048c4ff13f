use std::sync::Arc;

use certa_records::RecordStore;
use certa_types::{ItemId, RewardLogEntry, WalletAddress};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RegistrationConfig;

/// Outcome of one background reward grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RewardEvent {
    Granted {
        entry: RewardLogEntry,
        total_points: u64,
    },
    Failed {
        user: WalletAddress,
        item: ItemId,
        error: String,
    },
}

/// Grants registration rewards off the request path.
///
/// Each [`emit`](Self::emit) spawns a task that appends a reward log entry
/// and then credits the user. The outcome goes to every subscriber; with no
/// subscribers it is only logged.
#[derive(Clone)]
pub struct RewardEmitter {
    records: Arc<dyn RecordStore>,
    events: broadcast::Sender<RewardEvent>,
    points: u64,
    reason: String,
}

impl RewardEmitter {
    pub fn new(records: Arc<dyn RecordStore>, config: &RegistrationConfig) -> Self {
        let (events, _) = broadcast::channel(config.reward_channel_capacity.max(1));
        Self {
            records,
            events,
            points: config.reward_points,
            reason: config.reward_reason.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RewardEvent> {
        self.events.subscribe()
    }

    /// Spawn the grant for `user`'s registration of `item`.
    pub fn emit(&self, user: WalletAddress, item: ItemId) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let event = this.grant(user, item).await;
            // No receivers is fine; the outcome has been logged.
            let _ = this.events.send(event);
        })
    }

    async fn grant(&self, user: WalletAddress, item: ItemId) -> RewardEvent {
        let entry = RewardLogEntry::new(user, item, self.points, self.reason.clone());
        let result = async {
            let entry = self.records.insert_reward(entry).await?;
            let total = self.records.increment_user_points(&user, self.points).await?;
            Ok::<_, certa_records::RecordError>((entry, total))
        }
        .await;

        match result {
            Ok((entry, total_points)) => {
                debug!(user = %user, item = %item, points = self.points, total_points, "reward granted");
                RewardEvent::Granted {
                    entry,
                    total_points,
                }
            }
            Err(e) => {
                warn!(user = %user, item = %item, error = %e, "reward emission failed");
                RewardEvent::Failed {
                    user,
                    item,
                    error: e.to_string(),
                }
            }
        }
    }
}
