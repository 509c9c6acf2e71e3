//! Mute toggle for whichever device is active in a direction
//!
//! State 0 = muted, 1 = unmuted. The label names the next action.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Action, ActionContext, ActionKind, ClickGuard, BUSY_NOTICE};
use crate::events::{Notification, SubscriptionId};
use crate::registry::Direction;

#[derive(Clone)]
pub struct MuteButton {
    ctx: ActionContext,
    direction: Direction,
    rendered: Arc<Mutex<Option<bool>>>,
    guard: ClickGuard,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
}

impl MuteButton {
    pub fn new(ctx: ActionContext, direction: Direction) -> Self {
        let settle = Duration::from_millis(ctx.config.buttons.settle_ms);
        let button = Self {
            ctx,
            direction,
            rendered: Arc::new(Mutex::new(None)),
            guard: ClickGuard::new(settle),
            subscription: Arc::new(Mutex::new(None)),
        };

        let listener = button.clone();
        let id = button.ctx.bus().subscribe(move |n| listener.on_notification(n));
        *button.subscription.lock() = Some(id);

        if button.ctx.registry.is_status_loaded() {
            button.render(true);
        }
        button
    }

    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::MuteChanged { direction, .. }
            | Notification::ActiveChanged { direction, .. }
                if *direction == self.direction =>
            {
                self.render(false);
            }
            Notification::StatusLoaded => {
                self.render(false);
            }
            _ => {}
        }
    }

    fn tag(&self) -> &'static str {
        match self.direction {
            Direction::Input => "MICMUTE",
            Direction::Output => "OUTPUTMUTE",
        }
    }

    fn render(&self, force: bool) {
        let mut rendered = self.rendered.lock();
        let muted = self.ctx.registry.is_muted(self.direction);
        if force || *rendered != Some(muted) {
            *rendered = Some(muted);
            let (state, label) = if muted { (0, "Unmute") } else { (1, "Mute") };
            self.ctx.set_state(state, Some(label));
        }
    }

    /// Re-read the flag from the service (it may have changed via keyboard)
    async fn refresh(&self) {
        match self.ctx.registry.refresh_mute(self.direction).await {
            Ok(_) => self.render(true),
            Err(e) => warn!("[{}] Failed to refresh status: {}", self.tag(), e),
        }
    }

    pub async fn click(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("[{}] Toggle already in progress, ignoring", self.tag());
            self.ctx.toast(BUSY_NOTICE);
            return;
        };

        match self.ctx.registry.toggle_mute(self.direction).await {
            Ok(muted) => {
                self.render(false);
                let toast = match (muted, self.direction) {
                    (true, _) => "🔇 MUTED",
                    (false, Direction::Input) => "🎤 UNMUTED",
                    (false, Direction::Output) => "🔊 UNMUTED",
                };
                self.ctx.toast(toast);
            }
            Err(e) => {
                warn!("[{}] Toggle failed: {}", self.tag(), e);
                self.ctx.toast("❌ Failed to toggle mute");
            }
        }
    }
}

#[async_trait]
impl Action for MuteButton {
    fn kind(&self) -> ActionKind {
        match self.direction {
            Direction::Input => ActionKind::MicMute,
            Direction::Output => ActionKind::OutputMute,
        }
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
    use crate::testing::{action_context, fake_registry, FakeService, RecordingHost};

    #[tokio::test]
    async fn test_waits_for_status_before_rendering() {
        let service = FakeService::speakers_and_headphones();
        service.state().muted.input = true;
        let registry = fake_registry(&service);
        let host = RecordingHost::new();

        let _button = MuteButton::new(action_context("mic", &registry, &host), Direction::Input);
        assert!(host.states("mic").is_empty());

        registry.connect().await.unwrap();
        registry.stop_polling();

        assert_eq!(host.last_state("mic"), Some(0));
        assert_eq!(host.last_label("mic").as_deref(), Some("Unmute"));
    }

    #[tokio::test]
    async fn test_click_toggles() {
        let service = FakeService::speakers_and_headphones();
        let registry = fake_registry(&service);
        let host = RecordingHost::new();
        let button = MuteButton::new(action_context("mic", &registry, &host), Direction::Input);

        button.click().await;

        assert_eq!(service.mutations(), vec!["/audio/input/mute/toggle".to_string()]);
        assert_eq!(host.last_state("mic"), Some(0));
        assert_eq!(host.toasts("mic"), vec!["🔇 MUTED".to_string()]);
    }

    #[tokio::test]
    async fn test_visible_requeries_external_change() {
        let service = FakeService::speakers_and_headphones();
        let registry = fake_registry(&service);
        let host = RecordingHost::new();
        let button = MuteButton::new(action_context("out", &registry, &host), Direction::Output);
        button.on_add().await;
        assert_eq!(host.last_state("out"), Some(1));

        // Muted from the keyboard while the page was hidden
        service.state().muted.output = true;
        button.on_set_active(true).await;

        assert_eq!(host.last_state("out"), Some(0));
        assert!(service.calls().iter().all(|c| c == "/audio/output/mute/status"));
    }

    #[tokio::test]
    async fn test_failure_toast() {
        let service = FakeService::speakers_and_headphones();
        let registry = fake_registry(&service);
        let host = RecordingHost::new();
        let button = MuteButton::new(action_context("mic", &registry, &host), Direction::Input);
        service.fail_on("/mute/toggle");

        button.click().await;

        assert_eq!(host.toasts("mic"), vec!["❌ Failed to toggle mute".to_string()]);
        assert!(!registry.is_muted(Direction::Input));
    }
}
