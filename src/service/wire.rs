//! Response bodies of the automation service
//!
//! Only the fields the core reads are modelled; everything else in a body is
//! ignored. Index fields accept numbers and numeric strings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a JSON number or numeric string into an ordinal
///
/// Negative numbers (the service uses `-1` for "none"), non-numeric strings
/// and anything else become `None`.
pub fn coerce_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_index))
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// One entry of `/audio/devices/list`
#[derive(Debug, Clone, Deserialize)]
pub struct WireDevice {
    pub name: String,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDeviceLists {
    #[serde(default)]
    pub input: Vec<WireDevice>,
    #[serde(default)]
    pub output: Vec<WireDevice>,
}

/// `/audio/devices/list`
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceListResponse {
    pub devices: WireDeviceLists,
}

/// Active device of one direction in `/audio/status`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireActiveDevice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub index: Option<usize>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub uid: Option<String>,
}

/// `/audio/status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub input: WireActiveDevice,
    #[serde(default)]
    pub output: WireActiveDevice,
}

/// `/audio/{dir}/mute/status` and `/audio/{dir}/mute/toggle`
///
/// `muted` is required: a reply without it is not trusted into the cache.
#[derive(Debug, Clone, Deserialize)]
pub struct MuteResponse {
    pub muted: bool,
}

/// `/audio/{dir}/.../set`
#[derive(Debug, Clone, Deserialize)]
pub struct SetDeviceResponse {
    #[serde(default)]
    pub device: Option<String>,
}

/// `/system/caffeine/status` and `/system/caffeine/toggle`
#[derive(Debug, Clone, Deserialize)]
pub struct CaffeineResponse {
    #[serde(default)]
    pub active: bool,
}

/// `/cpu/status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStatusResponse {
    pub state: i64,
    #[serde(default)]
    pub temp_display: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// `/cpu/show-modal` and `/llm/dashboard`
#[derive(Debug, Clone, Deserialize)]
pub struct ModalResponse {
    #[serde(default)]
    pub shown: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `/llm/list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmListResponse {
    #[serde(default)]
    pub models: Vec<Value>,
    #[serde(default, rename = "freeRAM")]
    pub free_ram: Option<Value>,
    #[serde(default, rename = "totalRAM")]
    pub total_ram: Option<Value>,
}

/// `/llm/status?model=..&port=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmServerStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default, rename = "type")]
    pub engine: Option<String>,
    #[serde(default, deserialize_with = "lenient_port")]
    pub port: Option<u16>,
}

/// One entry of the general `/llm/status` server list
#[derive(Debug, Clone, Deserialize)]
pub struct LlmServer {
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "lenient_port")]
    pub port: Option<u16>,
    #[serde(default, rename = "type")]
    pub engine: Option<String>,
}

/// General `/llm/status`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmServerList {
    #[serde(default)]
    pub servers: Vec<LlmServer>,
}

/// `/llm/start`
///
/// `success: false` is not rejected by the client for this call because the
/// body carries `portConflict`, which the button reports differently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmStartResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub port_conflict: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub ram_warning: bool,
    #[serde(default, rename = "type")]
    pub engine: Option<String>,
    #[serde(default, deserialize_with = "lenient_port")]
    pub port: Option<u16>,
}

fn lenient_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(coerce_index)
        .and_then(|p| u16::try_from(p).ok()))
}
