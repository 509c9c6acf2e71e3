//! Which device a button selects, and how it renders against the cache

use serde_json::Value;
use std::fmt;

use crate::registry::{Device, DirectionalStatus};
use crate::service::wire::coerce_index;

/// Device reference stored in a button's settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ButtonBinding {
    #[default]
    Unbound,
    /// Stable device id
    ByUid(String),
    /// Legacy ordinal into the enumeration
    ByIndex(usize),
}

/// Three-valued device button icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceIcon {
    /// Not the active device, or unresolvable
    Inactive = 0,
    Active = 1,
    ActiveMuted = 2,
}

impl DeviceIcon {
    pub fn state(self) -> u8 {
        self as u8
    }
}

impl ButtonBinding {
    /// Read a binding from settings
    ///
    /// `deviceUID`/`currentUID` win over `currentIndex`/`deviceIndex`.
    /// Returns `None` when the settings mention none of these keys, so the
    /// caller keeps its current binding.
    pub fn from_params(params: &Value) -> Option<Self> {
        let uid_keys = ["deviceUID", "currentUID"];
        let index_keys = ["currentIndex", "deviceIndex"];

        let uid = uid_keys
            .iter()
            .filter_map(|k| params.get(*k).and_then(Value::as_str))
            .find(|s| !s.is_empty());
        if let Some(uid) = uid {
            return Some(ButtonBinding::ByUid(uid.to_string()));
        }

        if let Some(value) = index_keys.iter().find_map(|k| params.get(*k)) {
            return Some(
                coerce_index(value)
                    .map(ButtonBinding::ByIndex)
                    .unwrap_or(ButtonBinding::Unbound),
            );
        }

        // An explicitly emptied uid with no index clears the binding
        if uid_keys.iter().any(|k| params.get(*k).is_some()) {
            return Some(ButtonBinding::Unbound);
        }

        None
    }

    /// The bound device in the current enumeration
    pub fn resolve<'a>(&self, status: &'a DirectionalStatus) -> Option<&'a Device> {
        match self {
            ButtonBinding::Unbound => None,
            ButtonBinding::ByUid(uid) => status.device_by_uid(uid),
            ButtonBinding::ByIndex(index) => status.device_at(*index),
        }
    }

    /// Whether the bound device is the direction's active one
    ///
    /// A uid binding compares uids only; when the service reported no active
    /// uid the resolved device's name is compared instead.
    pub fn is_active(&self, status: &DirectionalStatus) -> bool {
        let Some(device) = self.resolve(status) else {
            return false;
        };

        match self {
            ButtonBinding::Unbound => false,
            ButtonBinding::ByUid(uid) => match &status.active_uid {
                Some(active) => active == uid,
                None => status.active_name.as_deref() == Some(device.name.as_str()),
            },
            ButtonBinding::ByIndex(index) => status.active_index == Some(*index),
        }
    }

    pub fn icon(&self, status: &DirectionalStatus) -> DeviceIcon {
        match (self.is_active(status), status.muted) {
            (false, _) => DeviceIcon::Inactive,
            (true, false) => DeviceIcon::Active,
            (true, true) => DeviceIcon::ActiveMuted,
        }
    }

    /// Upgrade an index binding to the uid of the device now at that index
    pub fn migrated(&self, status: &DirectionalStatus) -> Option<ButtonBinding> {
        match self {
            ButtonBinding::ByIndex(index) => status
                .device_at(*index)
                .and_then(|d| d.uid.clone())
                .map(ButtonBinding::ByUid),
            _ => None,
        }
    }

    pub fn uid(&self) -> Option<&str> {
        match self {
            ButtonBinding::ByUid(uid) => Some(uid),
            _ => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            ButtonBinding::ByIndex(index) => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for ButtonBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonBinding::Unbound => f.write_str("unbound"),
            ButtonBinding::ByUid(uid) => write!(f, "uid {}", uid),
            ButtonBinding::ByIndex(index) => write!(f, "index {}", index),
        }
    }
}
