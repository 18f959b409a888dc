use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::traits::IWorkflowStore;

/// Periodic removal of old tracker entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub max_age: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_age: Duration::from_secs(3600),
        }
    }
}

/// Start the sweeper in the background. Abort the handle to stop it.
pub fn spawn_sweeper(store: Arc<dyn IWorkflowStore>, config: SweeperConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep(config.max_age).await {
                Ok(0) => tracing::debug!("sweep found nothing to remove"),
                Ok(removed) => tracing::info!(removed, "swept expired workflow entries"),
                Err(e) => tracing::warn!(error = %e, "workflow sweep failed"),
            }
        }
    })
}
