//! Cached view of the remote audio state

use serde::Serialize;
use std::fmt;

use crate::service::wire::WireDevice;

/// Audio direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Input, Direction::Output];

    /// Path segment used by the service (`input` / `output`)
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enumerated audio device
///
/// `index` is the position in the current enumeration and changes on
/// hot-plug; `uid` is the durable identity whenever the service provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub name: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Device {
    pub fn new(name: impl Into<String>, index: usize, uid: Option<&str>) -> Self {
        Self {
            name: name.into(),
            index,
            uid: uid.filter(|u| !u.is_empty()).map(str::to_string),
        }
    }

    pub(crate) fn from_wire(list: Vec<WireDevice>) -> Vec<Device> {
        list.into_iter()
            .enumerate()
            .map(|(index, d)| Device {
                name: d.name,
                index,
                uid: d.uid,
            })
            .collect()
    }
}

/// Cached state of one direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionalStatus {
    pub devices: Vec<Device>,
    pub active_name: Option<String>,
    pub active_index: Option<usize>,
    pub active_uid: Option<String>,
    pub muted: bool,
}

impl DirectionalStatus {
    pub fn device_by_uid(&self, uid: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.uid.as_deref() == Some(uid))
    }

    pub fn device_at(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Whether `active_index` points at a device whose name is `active_name`
    pub fn is_consistent(&self) -> bool {
        match (self.active_index, &self.active_name) {
            (Some(i), Some(name)) => self.devices.get(i).map(|d| &d.name == name).unwrap_or(false),
            _ => true,
        }
    }
}

/// Per-direction pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directional<T> {
    pub input: T,
    pub output: T,
}

impl<T> Directional<T> {
    pub fn get(&self, direction: Direction) -> &T {
        match direction {
            Direction::Input => &self.input,
            Direction::Output => &self.output,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::Input => &mut self.input,
            Direction::Output => &mut self.output,
        }
    }
}

/// Registry lifecycle, forward-only within a process run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    StatusLoaded,
}

impl ConnectionState {
    /// Apply a transition, refusing to leave `StatusLoaded`
    pub fn advance(self, next: ConnectionState) -> ConnectionState {
        match self {
            ConnectionState::StatusLoaded => ConnectionState::StatusLoaded,
            _ => next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_loaded_never_regresses() {
        let state = ConnectionState::Disconnected
            .advance(ConnectionState::Connected)
            .advance(ConnectionState::StatusLoaded);
        assert_eq!(state, ConnectionState::StatusLoaded);
        assert_eq!(
            state.advance(ConnectionState::Disconnected),
            ConnectionState::StatusLoaded
        );
        // Before status is loaded a failed probe returns to disconnected
        assert_eq!(
            ConnectionState::Connected.advance(ConnectionState::Disconnected),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_consistency_check() {
        let mut status = DirectionalStatus {
            devices: vec![
                Device::new("Speakers", 0, Some("A")),
                Device::new("Headphones", 1, Some("B")),
            ],
            active_name: Some("Headphones".into()),
            active_index: Some(1),
            active_uid: Some("B".into()),
            muted: false,
        };
        assert!(status.is_consistent());

        status.active_index = Some(0);
        assert!(!status.is_consistent());
    }

    #[test]
    fn test_empty_uid_is_absent() {
        let device = Device::new("Built-in", 0, Some(""));
        assert_eq!(device.uid, None);
    }
}
