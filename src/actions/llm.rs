//! Local LLM server buttons
//!
//! `LlmToggleButton` starts/stops one model server on one port.
//! States: 0 = off, 1 = running, 2 = loading. Several toggles may run
//! different models on different ports at once; port conflicts and memory
//! checks are decided by the service.
//!
//! `LlmStatusButton` opens the service-side dashboard and asks every toggle
//! to re-query afterwards (the dashboard can stop servers).

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Action, ActionContext, ActionKind, ClickGuard, BUSY_NOTICE};
use crate::events::{Notification, SubscriptionId};
use crate::service::endpoints;
use crate::service::wire::{
    coerce_index, LlmListResponse, LlmServer, LlmServerList, LlmServerStatus, LlmStartResponse,
    ModalResponse,
};

pub const DEFAULT_PORT: u16 = 58004;
pub const DEFAULT_ENGINE: &str = "vllm-mlx";

/// Button settings edited in the property inspector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub model_id: String,
    pub port: u16,
    pub engine: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model_id: String::new(),
            port: DEFAULT_PORT,
            engine: DEFAULT_ENGINE.to_string(),
        }
    }
}

impl LlmSettings {
    /// Apply `modelId`, `port` and `engine` when present
    pub fn apply(&mut self, params: &Value) {
        if let Some(model) = params.get("modelId") {
            self.model_id = model.as_str().unwrap_or_default().to_string();
        }
        if let Some(port) = params.get("port") {
            self.port = coerce_index(port)
                .and_then(|p| u16::try_from(p).ok())
                .filter(|p| *p != 0)
                .unwrap_or(DEFAULT_PORT);
        }
        if let Some(engine) = params.get("engine") {
            self.engine = engine
                .as_str()
                .filter(|e| !e.is_empty())
                .unwrap_or(DEFAULT_ENGINE)
                .to_string();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LlmState {
    Off = 0,
    On = 1,
    Loading = 2,
}

#[derive(Clone)]
pub struct LlmToggleButton {
    ctx: ActionContext,
    settings: Arc<RwLock<LlmSettings>>,
    state: Arc<Mutex<LlmState>>,
    /// Set once the delayed first refresh has run
    startup_done: Arc<AtomicBool>,
    /// Poll task while a model is loading
    loader: Arc<Mutex<Option<JoinHandle<()>>>>,
    guard: ClickGuard,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
}

impl LlmToggleButton {
    pub fn new(ctx: ActionContext) -> Self {
        let settle = Duration::from_millis(ctx.config.buttons.llm_settle_ms);
        let button = Self {
            ctx,
            settings: Arc::new(RwLock::new(LlmSettings::default())),
            state: Arc::new(Mutex::new(LlmState::Off)),
            startup_done: Arc::new(AtomicBool::new(false)),
            loader: Arc::new(Mutex::new(None)),
            guard: ClickGuard::new(settle),
            subscription: Arc::new(Mutex::new(None)),
        };

        let listener = button.clone();
        let id = button.ctx.bus().subscribe(move |n| match n {
            Notification::StatusLoaded | Notification::RefreshRequested => {
                listener.schedule_refresh()
            }
            _ => {}
        });
        *button.subscription.lock() = Some(id);

        if button.ctx.registry.is_status_loaded() {
            button.schedule_refresh();
        }

        let task = button.clone();
        tokio::spawn(async move { task.load_model_list().await });
        button
    }

    pub fn settings(&self) -> LlmSettings {
        self.settings.read().clone()
    }

    pub fn state(&self) -> LlmState {
        *self.state.lock()
    }

    pub fn is_loading(&self) -> bool {
        self.loader
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn set_state(&self, state: LlmState) {
        *self.state.lock() = state;
        self.ctx.set_state(state as u8, None);
    }

    fn show_server(&self, engine: Option<&str>, port: Option<u16>) {
        let settings = self.settings();
        let engine = engine.unwrap_or(&settings.engine);
        let port = port.unwrap_or(settings.port);
        self.ctx.set_title(&format!("{}\n:{}", engine, port));
    }

    /// Refresh now, or after the startup delay the first time
    fn schedule_refresh(&self) {
        let button = self.clone();
        if self.startup_done.load(Ordering::Acquire) {
            tokio::spawn(async move { button.refresh_status().await });
            return;
        }

        let delay = Duration::from_millis(self.ctx.config.polling.llm_startup_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            button.startup_done.store(true, Ordering::Release);
            button.refresh_status().await;
        });
    }

    /// Send the model catalogue to the property inspector
    pub async fn load_model_list(&self) {
        match self
            .ctx
            .client()
            .query_as::<LlmListResponse>(&endpoints::llm_list())
            .await
        {
            Ok(list) => {
                let settings = self.settings();
                self.ctx.send_params(json!({
                    "list": list.models,
                    "freeRAM": list.free_ram,
                    "totalRAM": list.total_ram,
                    "currentModelId": settings.model_id,
                    "currentPort": settings.port,
                    "engine": settings.engine,
                }));
            }
            Err(e) => warn!("[LLM] Failed to load models: {}", e),
        }
    }

    pub async fn refresh_status(&self) {
        let settings = self.settings();
        if settings.model_id.is_empty() {
            self.set_state(LlmState::Off);
            return;
        }

        let status = self
            .ctx
            .client()
            .query_as::<LlmServerStatus>(&endpoints::llm_status(&settings.model_id, settings.port))
            .await;

        match status {
            Ok(status) if status.running => {
                self.stop_loading();
                self.set_state(LlmState::On);
                self.show_server(status.engine.as_deref(), status.port);
            }
            Ok(_) => match self.find_server(&settings.model_id).await {
                Some(server) => {
                    // Running on another port: adopt it
                    if let Some(port) = server.port {
                        self.settings.write().port = port;
                    }
                    self.stop_loading();
                    self.set_state(LlmState::On);
                    self.show_server(server.engine.as_deref(), server.port);
                }
                None if self.is_loading() => {}
                None => {
                    self.set_state(LlmState::Off);
                    self.ctx.set_title("");
                }
            },
            Err(e) => {
                warn!("[LLM] Status check failed: {}", e);
                if !self.is_loading() {
                    self.set_state(LlmState::Off);
                }
            }
        }
    }

    async fn find_server(&self, model: &str) -> Option<LlmServer> {
        match self
            .ctx
            .client()
            .query_as::<LlmServerList>(&endpoints::llm_servers())
            .await
        {
            Ok(list) => list.servers.into_iter().find(|s| s.model == model),
            Err(e) => {
                debug!("[LLM] Server list unavailable: {}", e);
                None
            }
        }
    }

    /// Poll until the server reports running or the poll budget is spent
    fn start_loading_poll(&self) {
        self.stop_loading();

        let button = self.clone();
        let period = Duration::from_millis(self.ctx.config.polling.llm_interval_ms);
        let max_polls = self.ctx.config.polling.llm_max_polls;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            for _ in 0..max_polls {
                ticker.tick().await;

                let settings = button.settings();
                let status = button
                    .ctx
                    .client()
                    .query_as::<LlmServerStatus>(&endpoints::llm_status(
                        &settings.model_id,
                        settings.port,
                    ))
                    .await;

                match status {
                    Ok(status) if status.running => {
                        info!("[LLM] {} ready on port {}", settings.model_id, settings.port);
                        button.set_state(LlmState::On);
                        button.show_server(status.engine.as_deref(), status.port);
                        button.ctx.toast("🤖 LLM ready!");
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("[LLM] Loading poll failed: {}", e),
                }
            }

            warn!("[LLM] Gave up waiting for the model after {} polls", max_polls);
            button.set_state(LlmState::Off);
            button.ctx.toast("⚠️ Timed out loading model");
        });
        *self.loader.lock() = Some(handle);
    }

    fn stop_loading(&self) {
        if let Some(handle) = self.loader.lock().take() {
            handle.abort();
        }
    }

    pub async fn click(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            self.ctx.toast(BUSY_NOTICE);
            return;
        };

        let settings = self.settings();
        if settings.model_id.is_empty() {
            self.ctx.toast("⚠️ Open the settings and pick a model");
            return;
        }

        if self.state() == LlmState::On {
            self.stop_server(&settings).await;
        } else {
            self.start_server(&settings).await;
        }
    }

    async fn stop_server(&self, settings: &LlmSettings) {
        match self.ctx.client().mutate(&endpoints::llm_stop(settings.port)).await {
            Ok(_) => {
                info!("[LLM] Stopped server on port {}", settings.port);
                self.set_state(LlmState::Off);
                self.ctx.set_title("");
                self.ctx.toast("🤖 LLM OFF");
            }
            Err(e) => {
                warn!("[LLM] Stop failed: {}", e);
                self.ctx.toast(&format!("❌ {}", e.user_message()));
            }
        }
    }

    async fn start_server(&self, settings: &LlmSettings) {
        let endpoint = endpoints::llm_start(&settings.model_id, settings.port, &settings.engine);
        let response = match self
            .ctx
            .client()
            .mutate_raw_as::<LlmStartResponse>(&endpoint)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("[LLM] Start failed: {}", e);
                self.ctx.toast(&format!("❌ {}", e.user_message()));
                return;
            }
        };

        if response.success == Some(false) {
            if response.port_conflict {
                self.ctx
                    .toast(&format!("🚫 Port {} in use! Pick another.", settings.port));
            } else {
                let reason = response.error.as_deref().unwrap_or("Server error");
                self.ctx.toast(&format!("❌ {}", reason));
            }
            return;
        }

        if response.running {
            self.set_state(LlmState::On);
            self.show_server(response.engine.as_deref(), response.port);
            self.ctx.toast("🤖 Already running");
        } else if response.loading {
            self.set_state(LlmState::Loading);
            self.ctx.toast("🤖 Already loading...");
            self.start_loading_poll();
        } else {
            info!("[LLM] Starting {} on port {}", settings.model_id, settings.port);
            self.set_state(LlmState::Loading);
            self.ctx.toast(if response.ram_warning {
                "⚠️ Low RAM! May be slow..."
            } else {
                "🤖 Loading (~30s)..."
            });
            self.start_loading_poll();
        }
    }
}

#[async_trait]
impl Action for LlmToggleButton {
    fn kind(&self) -> ActionKind {
        ActionKind::LlmToggle
    }

    async fn on_add(&self) {
        self.load_model_list().await;
        self.refresh_status().await;
    }

    async fn on_run(&self) {
        self.click().await;
    }

    async fn on_set_active(&self, active: bool) {
        if active {
            self.refresh_status().await;
            self.load_model_list().await;
        }
    }

    async fn on_params(&self, params: Value) {
        self.settings.write().apply(&params);
        self.refresh_status().await;
    }

    fn on_clear(&self) {
        self.stop_loading();
        if let Some(id) = self.subscription.lock().take() {
            self.ctx.bus().unsubscribe(id);
        }
    }
}

/// Dashboard button; single state
#[derive(Clone)]
pub struct LlmStatusButton {
    ctx: ActionContext,
    guard: ClickGuard,
}

impl LlmStatusButton {
    pub fn new(ctx: ActionContext) -> Self {
        let settle = Duration::from_millis(ctx.config.buttons.modal_settle_ms);
        Self {
            ctx,
            guard: ClickGuard::new(settle),
        }
    }

    pub async fn click(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            self.ctx.toast("⏳ Loading...");
            return;
        };

        match self
            .ctx
            .client()
            .mutate_as::<ModalResponse>(&endpoints::llm_dashboard())
            .await
        {
            Ok(response) if response.shown => {
                // The dashboard may have stopped servers
                self.ctx.bus().publish(Notification::RefreshRequested);
            }
            Ok(response) => {
                let reason = response.error.as_deref().unwrap_or("Failed to show dashboard");
                self.ctx.toast(&format!("❌ {}", reason));
            }
            Err(e) => {
                warn!("[LLMSTATUS] Dashboard failed: {}", e);
                self.ctx.toast(&format!("❌ {}", e.user_message()));
            }
        }
    }
}

#[async_trait]
impl Action for LlmStatusButton {
    fn kind(&self) -> ActionKind {
        ActionKind::LlmStatus
    }

    async fn on_add(&self) {}

    async fn on_run(&self) {
        self.click().await;
    }

    fn on_clear(&self) {}
}
