//! CPU temperature monitor
//!
//! Five icons, 0 (cool) to 4 (critical). Polls while the button is visible;
//! a click opens the service-side detail modal.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::{Action, ActionContext, ActionKind, ClickGuard, BUSY_NOTICE};
use crate::service::endpoints;
use crate::service::wire::{CpuStatusResponse, ModalResponse};

/// Highest icon index
const MAX_STATE: i64 = 4;

#[derive(Clone)]
pub struct CpuTempButton {
    ctx: ActionContext,
    state: Arc<Mutex<u8>>,
    poller: Arc<Mutex<Option<JoinHandle<()>>>>,
    guard: ClickGuard,
}

impl CpuTempButton {
    pub fn new(ctx: ActionContext) -> Self {
        let settle = Duration::from_millis(ctx.config.buttons.modal_settle_ms);
        Self {
            ctx,
            state: Arc::new(Mutex::new(0)),
            poller: Arc::new(Mutex::new(None)),
            guard: ClickGuard::new(settle),
        }
    }

    pub fn state(&self) -> u8 {
        *self.state.lock()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().is_some()
    }

    pub async fn refresh(&self) {
        match self
            .ctx
            .client()
            .query_as::<CpuStatusResponse>(&endpoints::cpu_status())
            .await
        {
            Ok(status) => {
                let state = status.state.clamp(0, MAX_STATE) as u8;
                *self.state.lock() = state;
                self.ctx.set_state(state, None);
                if let (Some(temp), Some(label)) = (&status.temp_display, &status.label) {
                    self.ctx.set_title(&format!("{}\n{}", temp, label));
                }
            }
            Err(e) => {
                warn!("[CPUTEMP] Status failed: {}", e);
                *self.state.lock() = MAX_STATE as u8;
                self.ctx.set_state(MAX_STATE as u8, None);
                self.ctx.set_title("—\nError");
            }
        }
    }

    /// (Re)start the periodic refresh
    pub fn start_polling(&self) {
        self.stop_polling();

        let button = self.clone();
        let period = Duration::from_millis(self.ctx.config.polling.cpu_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                button.refresh().await;
            }
        });
        *self.poller.lock() = Some(handle);
    }

    pub fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
            debug!("[CPUTEMP] Polling stopped");
        }
    }

    pub async fn click(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            self.ctx.toast(BUSY_NOTICE);
            return;
        };

        match self
            .ctx
            .client()
            .mutate_as::<ModalResponse>(&endpoints::cpu_show_modal())
            .await
        {
            Ok(response) if response.shown => self.refresh().await,
            Ok(response) => {
                let reason = response.error.as_deref().unwrap_or("Modal not shown");
                self.ctx.toast(&format!("❌ {}", reason));
            }
            Err(e) => {
                warn!("[CPUTEMP] Show modal failed: {}", e);
                self.ctx.toast(&format!("❌ {}", e.user_message()));
            }
        }
    }
}

#[async_trait]
impl Action for CpuTempButton {
    fn kind(&self) -> ActionKind {
        ActionKind::CpuTemp
    }

    async fn on_add(&self) {
        self.refresh().await;
        self.start_polling();
    }

    async fn on_run(&self) {
        self.click().await;
    }

    async fn on_set_active(&self, active: bool) {
        if active {
            self.refresh().await;
            self.start_polling();
        } else {
            self.stop_polling();
        }
    }

    fn on_clear(&self) {
        self.stop_polling();
    }
}
