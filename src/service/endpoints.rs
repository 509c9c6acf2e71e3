//! Endpoint catalogue of the automation service

use crate::registry::Direction;
use crate::transport::Endpoint;

pub fn health() -> Endpoint {
    Endpoint::path("/health")
}

pub fn device_list() -> Endpoint {
    Endpoint::path("/audio/devices/list")
}

pub fn audio_status() -> Endpoint {
    Endpoint::path("/audio/status")
}

pub fn mute_status(direction: Direction) -> Endpoint {
    Endpoint::path("/audio")
        .segment(direction.as_str())
        .segment("mute")
        .segment("status")
}

pub fn mute_toggle(direction: Direction) -> Endpoint {
    Endpoint::path("/audio")
        .segment(direction.as_str())
        .segment("mute")
        .segment("toggle")
}

pub fn set_by_name(direction: Direction, name: &str) -> Endpoint {
    Endpoint::path("/audio")
        .segment(direction.as_str())
        .segment(name)
        .segment("set")
}

/// `index` is the 0-based ordinal; the service expects it 1-based
pub fn set_by_index(direction: Direction, index: usize) -> Endpoint {
    Endpoint::path("/audio")
        .segment(direction.as_str())
        .segment("index")
        .segment((index + 1).to_string())
        .segment("set")
}

pub fn set_by_uid(direction: Direction, uid: &str) -> Endpoint {
    Endpoint::path("/audio")
        .segment(direction.as_str())
        .segment("uid")
        .segment(uid)
        .segment("set")
}

pub fn caffeine_status() -> Endpoint {
    Endpoint::path("/system/caffeine/status")
}

pub fn caffeine_toggle() -> Endpoint {
    Endpoint::path("/system/caffeine/toggle")
}

pub fn cpu_status() -> Endpoint {
    Endpoint::path("/cpu/status")
}

pub fn cpu_show_modal() -> Endpoint {
    Endpoint::path("/cpu/show-modal")
}

pub fn llm_list() -> Endpoint {
    Endpoint::path("/llm/list")
}

pub fn llm_servers() -> Endpoint {
    Endpoint::path("/llm/status")
}

pub fn llm_status(model: &str, port: u16) -> Endpoint {
    Endpoint::path("/llm/status")
        .query("model", model)
        .query("port", port.to_string())
}

pub fn llm_start(model: &str, port: u16, engine: &str) -> Endpoint {
    Endpoint::path("/llm/start")
        .query("model", model)
        .query("port", port.to_string())
        .query("engine", engine)
}

pub fn llm_stop(port: u16) -> Endpoint {
    Endpoint::path("/llm/stop").query("port", port.to_string())
}

pub fn llm_dashboard() -> Endpoint {
    Endpoint::path("/llm/dashboard")
}
