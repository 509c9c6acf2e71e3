//! Device registry - cached mirror of the remote audio state
//!
//! The registry owns the only shared mutable state of the process: device
//! lists, active device per direction and mute flags. It is written by
//! confirmed status refreshes, by successful mutations (optimistic patch
//! before returning) and overwritten wholesale by the background poll.
//!
//! Change detection always compares against the last committed value, so a
//! change is published once. Responses are applied in completion order; a
//! slow stale response can overwrite a newer one until the next poll.

mod model;
mod polling;

pub use model::{ConnectionState, Device, Direction, Directional, DirectionalStatus};
pub use polling::PollSettings;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::events::{EventBus, Notification};
use crate::service::endpoints;
use crate::service::wire::{DeviceListResponse, MuteResponse, SetDeviceResponse, StatusResponse};
use crate::service::ServiceClient;

/// Result of a successful device switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switched {
    /// Name reported by the service, else the cached one
    pub name: Option<String>,
    /// `false` when the mute re-read failed and the cached flag still
    /// belongs to the previously active device
    pub mute_refreshed: bool,
}

/// Device registry and status cache
pub struct DeviceRegistry {
    client: ServiceClient,
    bus: EventBus,
    cache: RwLock<Directional<DirectionalStatus>>,
    state: RwLock<ConnectionState>,
    poll_settings: PollSettings,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceRegistry {
    pub fn new(client: ServiceClient, bus: EventBus, poll_settings: PollSettings) -> Arc<Self> {
        Arc::new(Self {
            client,
            bus,
            cache: RwLock::new(Directional::default()),
            state: RwLock::new(ConnectionState::Disconnected),
            poll_settings,
            poller: Mutex::new(None),
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Run the initial sync sequence and start polling
    ///
    /// `check_health → load_devices → refresh_status → StatusLoaded`. A failed
    /// health probe stops here and leaves the registry idle until `connect`
    /// is called again. Device/status failures are logged and the sequence
    /// still completes; the poll fills the gaps later.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ApiError> {
        self.check_health().await?;

        if let Err(e) = self.load_devices().await {
            warn!("⚠️  Failed to load devices: {}", e);
        }
        if let Err(e) = self.refresh_status().await {
            warn!("⚠️  Failed to load initial status: {}", e);
        }

        self.advance(ConnectionState::StatusLoaded);
        info!("✅ Initial status loaded");
        self.bus.publish(Notification::StatusLoaded);

        self.start_polling();
        Ok(())
    }

    /// Single no-retry probe of `/health`
    pub async fn check_health(&self) -> Result<(), ApiError> {
        match self.client.probe(&endpoints::health()).await {
            Ok(_) => {
                info!("✅ Automation service OK");
                self.advance(ConnectionState::Connected);
                self.bus.publish(Notification::Connected);
                Ok(())
            }
            Err(e) => {
                error!("❌ Automation service not running: {}", e);
                self.advance(ConnectionState::Disconnected);
                self.bus.publish(Notification::Disconnected);
                Err(ApiError::ConnectionUnavailable)
            }
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_status_loaded(&self) -> bool {
        self.connection_state() == ConnectionState::StatusLoaded
    }

    fn advance(&self, next: ConnectionState) {
        let mut state = self.state.write();
        *state = state.advance(next);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Replace both device lists; always publishes `DevicesLoaded`
    pub async fn load_devices(&self) -> Result<(), ApiError> {
        let list: DeviceListResponse = self.client.query_as(&endpoints::device_list()).await?;

        let input = Device::from_wire(list.devices.input);
        let output = Device::from_wire(list.devices.output);
        info!(
            "✅ Devices loaded: input={}, output={}",
            input.len(),
            output.len()
        );

        {
            let mut cache = self.cache.write();
            cache.input.devices = input;
            cache.output.devices = output;
        }

        self.bus.publish(Notification::DevicesLoaded);
        Ok(())
    }

    /// Fetch active devices and mute flags for both directions
    ///
    /// `ActiveChanged` fires only when the active name differs from the
    /// cached one; index and uid are stored alongside without triggering.
    pub async fn refresh_status(&self) -> Result<(), ApiError> {
        let status: StatusResponse = self.client.query_as(&endpoints::audio_status()).await?;

        let mut changes = Vec::new();
        {
            let mut cache = self.cache.write();
            for (direction, active) in [
                (Direction::Input, status.input),
                (Direction::Output, status.output),
            ] {
                let slot = cache.get_mut(direction);
                if slot.active_name != active.name {
                    changes.push(Notification::ActiveChanged {
                        direction,
                        name: active.name.clone(),
                    });
                }
                slot.active_name = active.name;
                slot.active_index = active.index;
                slot.active_uid = active.uid;
            }
        }

        for change in changes {
            self.bus.publish(change);
        }

        for direction in Direction::ALL {
            if let Err(e) = self.refresh_mute(direction).await {
                warn!("Failed to refresh {} mute status: {}", direction, e);
            }
        }

        Ok(())
    }

    /// Fetch one direction's mute flag; publishes `MuteChanged` on change
    pub async fn refresh_mute(&self, direction: Direction) -> Result<bool, ApiError> {
        let response: MuteResponse = self
            .client
            .query_as(&endpoints::mute_status(direction))
            .await?;
        self.commit_mute(direction, response.muted, false);
        Ok(response.muted)
    }

    fn commit_mute(&self, direction: Direction, muted: bool, always_publish: bool) {
        let changed = {
            let mut cache = self.cache.write();
            let slot = cache.get_mut(direction);
            let changed = slot.muted != muted;
            slot.muted = muted;
            changed
        };

        if changed || always_publish {
            self.bus
                .publish(Notification::MuteChanged { direction, muted });
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Activate the device with the given stable id
    pub async fn set_active_by_uid(
        &self,
        direction: Direction,
        uid: &str,
    ) -> Result<Switched, ApiError> {
        let response: SetDeviceResponse = self
            .client
            .mutate_as(&endpoints::set_by_uid(direction, uid))
            .await?;

        let name = {
            let mut cache = self.cache.write();
            let slot = cache.get_mut(direction);
            let device = slot.device_by_uid(uid).cloned();
            let name = response.device.or_else(|| device.as_ref().map(|d| d.name.clone()));
            slot.active_name = name.clone();
            slot.active_uid = Some(uid.to_string());
            slot.active_index = device.map(|d| d.index);
            name
        };

        info!(
            "✅ {} changed to: {} (UID: {})",
            direction,
            name.as_deref().unwrap_or("?"),
            uid
        );
        Ok(self.after_switch(direction, name).await)
    }

    /// Activate the device at a 0-based ordinal (sent 1-based on the wire)
    pub async fn set_active_by_index(
        &self,
        direction: Direction,
        index: usize,
    ) -> Result<Switched, ApiError> {
        let response: SetDeviceResponse = self
            .client
            .mutate_as(&endpoints::set_by_index(direction, index))
            .await?;

        let name = {
            let mut cache = self.cache.write();
            let slot = cache.get_mut(direction);
            let device = slot.device_at(index).cloned();
            let name = response.device.or_else(|| device.as_ref().map(|d| d.name.clone()));
            slot.active_name = name.clone();
            slot.active_index = Some(index);
            slot.active_uid = device.and_then(|d| d.uid);
            name
        };

        info!(
            "✅ {} changed to: {} (Index: {})",
            direction,
            name.as_deref().unwrap_or("?"),
            index
        );
        Ok(self.after_switch(direction, name).await)
    }

    /// Activate the device with the given name
    pub async fn set_active_by_name(
        &self,
        direction: Direction,
        name: &str,
    ) -> Result<Switched, ApiError> {
        let response: SetDeviceResponse = self
            .client
            .mutate_as(&endpoints::set_by_name(direction, name))
            .await?;

        let name = {
            let mut cache = self.cache.write();
            let slot = cache.get_mut(direction);
            let device = slot.device_by_name(name).cloned();
            let name = response.device.unwrap_or_else(|| name.to_string());
            slot.active_name = Some(name.clone());
            slot.active_index = device.as_ref().map(|d| d.index);
            slot.active_uid = device.and_then(|d| d.uid);
            name
        };

        info!("✅ {} changed to: {}", direction, name);
        Ok(self.after_switch(direction, Some(name)).await)
    }

    /// Re-read the new device's mute flag, then tell every button
    async fn after_switch(&self, direction: Direction, name: Option<String>) -> Switched {
        let mute_refreshed = match self.refresh_mute(direction).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to refresh {} mute status after switch: {}", direction, e);
                false
            }
        };

        self.bus.publish(Notification::ActiveChanged {
            direction,
            name: name.clone(),
        });
        Switched {
            name,
            mute_refreshed,
        }
    }

    /// Toggle the mute flag of the active device; returns the new flag
    pub async fn toggle_mute(&self, direction: Direction) -> Result<bool, ApiError> {
        let response: MuteResponse = self
            .client
            .mutate_as(&endpoints::mute_toggle(direction))
            .await?;

        info!(
            "🔇 {} {}",
            direction,
            if response.muted { "muted" } else { "unmuted" }
        );
        self.commit_mute(direction, response.muted, true);
        Ok(response.muted)
    }

    // =========================================================================
    // Cache accessors
    // =========================================================================

    pub fn devices(&self, direction: Direction) -> Vec<Device> {
        self.cache.read().get(direction).devices.clone()
    }

    pub fn status(&self, direction: Direction) -> DirectionalStatus {
        self.cache.read().get(direction).clone()
    }

    pub fn is_muted(&self, direction: Direction) -> bool {
        self.cache.read().get(direction).muted
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            handle.abort();
        }
    }
}
