//! Background status poll
//!
//! Keeps the cache converging on external changes. Failures are logged and
//! never stop the loop; the next tick simply tries again.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::DeviceRegistry;
use crate::config::PollingConfig;

/// Poll cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Reload device lists every N status polls (0 disables)
    pub device_refresh_every: u32,
}

impl PollSettings {
    pub fn from_config(polling: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_millis(polling.status_interval_ms),
            device_refresh_every: polling.device_refresh_every,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

impl DeviceRegistry {
    pub fn poll_settings(&self) -> PollSettings {
        self.poll_settings
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Start the periodic refresh if not already running
    pub fn start_polling(self: &Arc<Self>) {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return; // Already running
        }

        let settings = self.poll_settings;
        let registry = Arc::downgrade(self);
        info!("🔄 Status polling every {}ms", settings.interval.as_millis());
        *poller = Some(tokio::spawn(poll_loop(registry, settings)));
    }

    pub fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
            debug!("Status polling stopped");
        }
    }
}

async fn poll_loop(registry: Weak<DeviceRegistry>, settings: PollSettings) {
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; connect() just refreshed
    ticker.tick().await;

    let mut tick: u64 = 0;
    loop {
        ticker.tick().await;
        tick += 1;

        let Some(registry) = registry.upgrade() else {
            debug!("Registry dropped, polling ends");
            break;
        };

        let every = u64::from(settings.device_refresh_every);
        if every > 0 && tick % every == 0 {
            if let Err(e) = registry.load_devices().await {
                warn!("Device list poll failed: {}", e);
            }
        }

        if let Err(e) = registry.refresh_status().await {
            warn!(
                "Status poll failed (retry in {}ms): {}",
                settings.interval.as_millis(),
                e
            );
        }
    }
}
