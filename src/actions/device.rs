//! Input/output device selector button
//!
//! Icon: 0 = not active, 1 = active, 2 = active and muted.
//! Click: select the device (leaving it unmuted), or toggle mute when it
//! already is the active one.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Action, ActionContext, ActionKind, ButtonBinding, ClickGuard, DeviceIcon, BUSY_NOTICE};
use crate::events::{Notification, SubscriptionId};
use crate::registry::{Device, Direction};

#[derive(Clone)]
pub struct DeviceButton {
    ctx: ActionContext,
    direction: Direction,
    binding: Arc<RwLock<ButtonBinding>>,
    /// Last icon pushed to the host
    rendered: Arc<Mutex<Option<DeviceIcon>>>,
    guard: ClickGuard,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
}

impl DeviceButton {
    pub fn new(ctx: ActionContext, direction: Direction) -> Self {
        let settle = Duration::from_millis(ctx.config.buttons.settle_ms);
        let button = Self {
            ctx,
            direction,
            binding: Arc::new(RwLock::new(ButtonBinding::Unbound)),
            rendered: Arc::new(Mutex::new(None)),
            guard: ClickGuard::new(settle),
            subscription: Arc::new(Mutex::new(None)),
        };

        button.subscribe();
        button.send_device_list();
        button.render(true);
        button
    }

    pub fn binding(&self) -> ButtonBinding {
        self.binding.read().clone()
    }

    fn subscribe(&self) {
        let button = self.clone();
        let id = self
            .ctx
            .bus()
            .subscribe(move |notification| button.on_notification(notification));
        *self.subscription.lock() = Some(id);
    }

    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::DevicesLoaded => {
                self.try_migrate();
                self.send_device_list();
                self.render(false);
            }
            Notification::ActiveChanged { direction, .. }
            | Notification::MuteChanged { direction, .. }
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
            Direction::Input => "INPUT",
            Direction::Output => "OUTPUT",
        }
    }

    fn device_emoji(&self) -> &'static str {
        match self.direction {
            Direction::Input => "🎤",
            Direction::Output => "🔊",
        }
    }

    /// Push the icon computed from the cache; unchanged icons are skipped
    /// unless `force` is set
    ///
    /// The cache is read under the `rendered` lock so concurrent renders
    /// push in the same order they read.
    fn render(&self, force: bool) -> DeviceIcon {
        let mut rendered = self.rendered.lock();
        let status = self.ctx.registry.status(self.direction);
        let icon = self.binding.read().icon(&status);

        if force || *rendered != Some(icon) {
            *rendered = Some(icon);
            self.ctx.set_state(icon.state(), None);
        }
        icon
    }

    /// Offer the enumeration to the property inspector
    fn send_device_list(&self) {
        let status = self.ctx.registry.status(self.direction);
        if status.devices.is_empty() {
            warn!("[{}] No devices to send", self.tag());
            return;
        }

        let binding = self.binding.read().clone();
        let current_index = binding.resolve(&status).map(|d| d.index);
        self.ctx.send_params(json!({
            "list": status.devices,
            "currentUID": binding.uid(),
            "currentIndex": current_index.or(binding.index()),
        }));
        debug!("[{}] Sent list with {} devices", self.tag(), status.devices.len());
    }

    /// Index bindings whose device now has a uid switch to that uid
    fn try_migrate(&self) {
        let status = self.ctx.registry.status(self.direction);
        let mut binding = self.binding.write();
        if let Some(upgraded) = binding.migrated(&status) {
            info!("[{}] Binding migrated: {} → {}", self.tag(), *binding, upgraded);
            *binding = upgraded;
        }
    }

    fn apply_params(&self, params: &Value) {
        let Some(mut next) = ButtonBinding::from_params(params) else {
            return;
        };

        let status = self.ctx.registry.status(self.direction);
        if let Some(upgraded) = next.migrated(&status) {
            info!("[{}] Binding migrated: {} → {}", self.tag(), next, upgraded);
            next = upgraded;
        }

        {
            let mut binding = self.binding.write();
            if *binding != next {
                debug!("[{}] Binding set to {}", self.tag(), next);
                *binding = next;
            }
        }
        self.render(false);
    }

    /// Click protocol
    pub async fn click(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("[{}] Click ignored, previous one still running", self.tag());
            self.ctx.toast(BUSY_NOTICE);
            return;
        };

        let binding = self.binding();
        if binding == ButtonBinding::Unbound {
            self.ctx.toast("⚠️ Device not configured");
            return;
        }

        let status = self.ctx.registry.status(self.direction);
        let Some(device) = binding.resolve(&status).cloned() else {
            warn!("[{}] Bound device {} not found", self.tag(), binding);
            self.ctx.toast("❌ Device not found");
            return;
        };

        match binding.icon(&status) {
            DeviceIcon::Inactive => self.select(&binding, &device).await,
            DeviceIcon::Active | DeviceIcon::ActiveMuted => self.toggle_mute().await,
        }
    }

    async fn select(&self, binding: &ButtonBinding, device: &Device) {
        let registry = &self.ctx.registry;
        info!("[{}] Switching to {} ({})", self.tag(), device.name, binding);

        let result = match binding {
            ButtonBinding::ByUid(uid) => registry.set_active_by_uid(self.direction, uid).await,
            ButtonBinding::ByIndex(index) => {
                registry.set_active_by_index(self.direction, *index).await
            }
            ButtonBinding::Unbound => return,
        };

        let switched = match result {
            Ok(switched) => switched,
            Err(e) => {
                warn!("[{}] Switch failed: {}", self.tag(), e);
                self.ctx.toast("❌ Failed to switch device");
                return;
            }
        };
        let name = switched.name.unwrap_or_else(|| device.name.clone());

        // A newly selected device never keeps a stale mute. The cached flag
        // is only trusted once it was re-read for the new device.
        if !switched.mute_refreshed {
            warn!("[{}] Mute state of {} unknown, leaving it as is", self.tag(), name);
        } else if registry.is_muted(self.direction) {
            info!("[{}] {} was muted, unmuting", self.tag(), name);
            if let Err(e) = registry.toggle_mute(self.direction).await {
                warn!("[{}] Unmute after switch failed: {}", self.tag(), e);
                self.render(false);
                self.ctx.toast("❌ Failed to unmute device");
                return;
            }
        }

        self.render(false);
        self.ctx.toast(&format!("{} {}", self.device_emoji(), name));
    }

    async fn toggle_mute(&self) {
        match self.ctx.registry.toggle_mute(self.direction).await {
            Ok(muted) => {
                self.render(false);
                if muted {
                    self.ctx.toast("🔇 MUTED");
                } else {
                    self.ctx.toast(&format!("{} UNMUTED", self.device_emoji()));
                }
            }
            Err(e) => {
                warn!("[{}] Mute toggle failed: {}", self.tag(), e);
                self.ctx.toast("❌ Failed to toggle mute");
            }
        }
    }
}

#[async_trait]
impl Action for DeviceButton {
    fn kind(&self) -> ActionKind {
        match self.direction {
            Direction::Input => ActionKind::InputDevice,
            Direction::Output => ActionKind::OutputDevice,
        }
    }

    async fn on_add(&self) {
        self.send_device_list();
        self.render(true);
    }

    async fn on_run(&self) {
        self.click().await;
    }

    async fn on_set_active(&self, active: bool) {
        if active {
            self.render(true);
        }
    }

    async fn on_params(&self, params: Value) {
        self.apply_params(&params);
    }

    fn on_clear(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.ctx.bus().unsubscribe(id);
        }
    }
}
