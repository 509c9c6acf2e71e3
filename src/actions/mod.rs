//! Deck button actions
//!
//! One instance per placed button, keyed by the host's opaque context id.
//! Every action type implements [`Action`]; the dispatcher only ever sees
//! `Arc<dyn Action>`.

mod binding;
mod caffeine;
mod cpu_temp;
mod device;
mod guard;
mod llm;
mod mute;

pub use binding::{ButtonBinding, DeviceIcon};
pub use caffeine::CaffeineButton;
pub use cpu_temp::CpuTempButton;
pub use device::DeviceButton;
pub use guard::{ClickGuard, ClickPermit};
pub use llm::{LlmStatusButton, LlmToggleButton};
pub use mute::MuteButton;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::host::DeckHost;
use crate::registry::{DeviceRegistry, Direction};
use crate::service::ServiceClient;

/// Shown when a click arrives while the previous one is still running
pub const BUSY_NOTICE: &str = "⏳ Please wait...";

/// Every button kind the plugin registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    InputDevice,
    OutputDevice,
    MicMute,
    OutputMute,
    Caffeine,
    CpuTemp,
    LlmToggle,
    LlmStatus,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::InputDevice,
        ActionKind::OutputDevice,
        ActionKind::MicMute,
        ActionKind::OutputMute,
        ActionKind::Caffeine,
        ActionKind::CpuTemp,
        ActionKind::LlmToggle,
        ActionKind::LlmStatus,
    ];

    /// Last component of the action UUID
    pub fn suffix(self) -> &'static str {
        match self {
            ActionKind::InputDevice => "input",
            ActionKind::OutputDevice => "output",
            ActionKind::MicMute => "micmute",
            ActionKind::OutputMute => "outputmute",
            ActionKind::Caffeine => "caffeine",
            ActionKind::CpuTemp => "cputemp",
            ActionKind::LlmToggle => "llmtoggle",
            ActionKind::LlmStatus => "llmstatus",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.suffix() == suffix)
    }

    /// Resolve `{plugin_uuid}.{suffix}`; other plugins' UUIDs are ignored
    pub fn from_uuid(plugin_uuid: &str, uuid: &str) -> Option<Self> {
        uuid.strip_prefix(plugin_uuid)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(Self::from_suffix)
    }

    pub fn uuid(self, plugin_uuid: &str) -> String {
        format!("{}.{}", plugin_uuid, self.suffix())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Handles a button needs to talk to the deck and the service
#[derive(Clone)]
pub struct ActionContext {
    /// Host-assigned button id
    pub context: String,
    pub host: Arc<dyn DeckHost>,
    pub registry: Arc<DeviceRegistry>,
    pub config: Arc<AppConfig>,
}

impl ActionContext {
    pub fn new(
        context: impl Into<String>,
        host: Arc<dyn DeckHost>,
        registry: Arc<DeviceRegistry>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            context: context.into(),
            host,
            registry,
            config,
        }
    }

    pub fn client(&self) -> &ServiceClient {
        self.registry.client()
    }

    pub fn bus(&self) -> &EventBus {
        self.registry.bus()
    }

    pub fn set_state(&self, state: u8, label: Option<&str>) {
        self.host.set_state(&self.context, state, label);
    }

    pub fn set_title(&self, title: &str) {
        self.host.set_title(&self.context, title);
    }

    pub fn toast(&self, message: &str) {
        self.host.toast(&self.context, message);
    }

    pub fn send_params(&self, params: Value) {
        self.host.send_params(&self.context, params);
    }
}

/// Button lifecycle
///
/// All methods take `&self`; actions keep their mutable state behind
/// locks so they can be shared with spawned tasks and bus listeners.
#[async_trait]
pub trait Action: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// The button was placed again on a page that already had it
    async fn on_add(&self);

    /// Button pressed
    async fn on_run(&self);

    /// Page shown (`true`) or hidden (`false`)
    async fn on_set_active(&self, _active: bool) {}

    /// Non-empty parameters from the app or the property inspector
    async fn on_params(&self, _params: Value) {}

    /// Button removed; release timers and subscriptions
    fn on_clear(&self);
}

/// Build the action for a freshly placed button
pub fn create(kind: ActionKind, ctx: ActionContext) -> Arc<dyn Action> {
    match kind {
        ActionKind::InputDevice => Arc::new(DeviceButton::new(ctx, Direction::Input)),
        ActionKind::OutputDevice => Arc::new(DeviceButton::new(ctx, Direction::Output)),
        ActionKind::MicMute => Arc::new(MuteButton::new(ctx, Direction::Input)),
        ActionKind::OutputMute => Arc::new(MuteButton::new(ctx, Direction::Output)),
        ActionKind::Caffeine => Arc::new(CaffeineButton::new(ctx)),
        ActionKind::CpuTemp => Arc::new(CpuTempButton::new(ctx)),
        ActionKind::LlmToggle => Arc::new(LlmToggleButton::new(ctx)),
        ActionKind::LlmStatus => Arc::new(LlmStatusButton::new(ctx)),
    }
}
