//! Sleep-prevention toggle
//!
//! State 0 = inactive ("Activate"), 1 = active ("Deactivate").

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Action, ActionContext, ActionKind, ClickGuard, BUSY_NOTICE};
use crate::events::{Notification, SubscriptionId};
use crate::service::endpoints;
use crate::service::wire::CaffeineResponse;

#[derive(Clone)]
pub struct CaffeineButton {
    ctx: ActionContext,
    /// Last known flag; `None` until the first successful query
    active: Arc<Mutex<Option<bool>>>,
    guard: ClickGuard,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
}

impl CaffeineButton {
    pub fn new(ctx: ActionContext) -> Self {
        let settle = Duration::from_millis(ctx.config.buttons.settle_ms);
        let button = Self {
            ctx,
            active: Arc::new(Mutex::new(None)),
            guard: ClickGuard::new(settle),
            subscription: Arc::new(Mutex::new(None)),
        };

        let listener = button.clone();
        let id = button.ctx.bus().subscribe(move |n| {
            if *n == Notification::StatusLoaded {
                let button = listener.clone();
                tokio::spawn(async move { button.refresh().await });
            }
        });
        *button.subscription.lock() = Some(id);

        if button.ctx.registry.is_status_loaded() {
            let task = button.clone();
            tokio::spawn(async move { task.refresh().await });
        }
        button
    }

    pub fn is_active(&self) -> Option<bool> {
        *self.active.lock()
    }

    /// Query the flag; the icon is pushed only when it changed
    pub async fn refresh(&self) {
        match self
            .ctx
            .client()
            .query_as::<CaffeineResponse>(&endpoints::caffeine_status())
            .await
        {
            Ok(status) => self.update(status.active, false),
            Err(e) => warn!("[CAFFEINE] Failed to refresh status: {}", e),
        }
    }

    fn update(&self, active: bool, force: bool) {
        let mut current = self.active.lock();
        let changed = current.replace(active) != Some(active);
        if changed || force {
            let (state, label) = if active {
                (1, "Deactivate")
            } else {
                (0, "Activate")
            };
            self.ctx.set_state(state, Some(label));
        }
    }

    pub async fn click(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("[CAFFEINE] Toggle already in progress, ignoring");
            self.ctx.toast(BUSY_NOTICE);
            return;
        };

        match self
            .ctx
            .client()
            .mutate_as::<CaffeineResponse>(&endpoints::caffeine_toggle())
            .await
        {
            Ok(response) => {
                self.update(response.active, true);
                self.ctx.toast(if response.active {
                    "☕ Caffeine ACTIVE"
                } else {
                    "💤 Caffeine INACTIVE"
                });
            }
            Err(e) => {
                warn!("[CAFFEINE] Toggle failed: {}", e);
                self.ctx.toast("❌ Failed to toggle caffeine");
            }
        }
    }
}

#[async_trait]
impl Action for CaffeineButton {
    fn kind(&self) -> ActionKind {
        ActionKind::Caffeine
    }

    async fn on_add(&self) {
        self.refresh().await;
    }

    async fn on_run(&self) {
        self.click().await;
    }

    async fn on_set_active(&self, active: bool) {
        if active {
            self.refresh().await;
        }
    }

    fn on_clear(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.ctx.bus().unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{action_context, fake_registry, settle_tasks, FakeService, RecordingHost};

    #[tokio::test]
    async fn test_status_loaded_triggers_query() {
        let service = FakeService::speakers_and_headphones();
        service.state().caffeine = true;
        let registry = fake_registry(&service);
        let host = RecordingHost::new();
        let button = CaffeineButton::new(action_context("cf", &registry, &host));

        registry.connect().await.unwrap();
        registry.stop_polling();
        settle_tasks().await;

        assert_eq!(button.is_active(), Some(true));
        assert_eq!(host.last_state("cf"), Some(1));
        assert_eq!(host.last_label("cf").as_deref(), Some("Deactivate"));
    }

    #[tokio::test]
    async fn test_click_toggles_and_unchanged_refresh_is_silent() {
        let service = FakeService::speakers_and_headphones();
        let registry = fake_registry(&service);
        let host = RecordingHost::new();
        let button = CaffeineButton::new(action_context("cf", &registry, &host));

        button.on_add().await;
        assert_eq!(host.states("cf"), vec![0]);

        button.click().await;
        assert_eq!(host.states("cf"), vec![0, 1]);
        assert_eq!(host.toasts("cf"), vec!["☕ Caffeine ACTIVE".to_string()]);

        button.on_set_active(true).await;
        assert_eq!(host.states("cf"), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_toggle_failure() {
        let service = FakeService::speakers_and_headphones();
        let registry = fake_registry(&service);
        let host = RecordingHost::new();
        let button = CaffeineButton::new(action_context("cf", &registry, &host));
        service.fail_on("/caffeine/toggle");

        button.click().await;

        assert_eq!(host.toasts("cf"), vec!["❌ Failed to toggle caffeine".to_string()]);
        assert!(!service.state().caffeine);
        assert_eq!(button.is_active(), None);
    }
}
