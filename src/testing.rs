//! Test doubles: an in-memory automation service and a recording deck host

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::actions::ActionContext;
use crate::config::AppConfig;
use crate::error::TransportError;
use crate::events::EventBus;
use crate::host::DeckHost;
use crate::registry::{DeviceRegistry, Direction, Directional, PollSettings};
use crate::service::{CallPolicy, ServiceClient};
use crate::transport::{CallOptions, Endpoint, Transport};

/// Simulated remote state
pub(crate) struct FakeState {
    pub healthy: bool,
    pub devices: Directional<Vec<(String, Option<String>)>>,
    pub active: Directional<Option<usize>>,
    pub muted: Directional<bool>,
    pub caffeine: bool,
    /// `(state, tempDisplay, label)`; `None` fails the call
    pub cpu: Option<(i64, String, String)>,
    pub modal_shown: bool,
    pub llm_models: Vec<String>,
    /// Running servers `(model, port, engine)`
    pub llm_servers: Vec<(String, u16, String)>,
    /// Servers still loading, promoted after `llm_ready_after` status calls
    pub llm_loading: Vec<(String, u16, String)>,
    pub llm_ready_after: u32,
    pub llm_status_calls: u32,
    /// Replaces the computed `/llm/start` body
    pub llm_start_reply: Option<Value>,
}

impl FakeState {
    pub fn set_active(&mut self, direction: Direction, index: usize) {
        *self.active.get_mut(direction) = Some(index);
    }

    pub fn add_device(&mut self, direction: Direction, name: &str, uid: Option<&str>) {
        self.devices
            .get_mut(direction)
            .push((name.to_string(), uid.map(str::to_string)));
    }

    pub fn remove_device(&mut self, direction: Direction, uid: &str) {
        let list = self.devices.get_mut(direction);
        let active_name = (*self.active.get(direction))
            .and_then(|i| list.get(i))
            .map(|d| d.0.clone());
        list.retain(|(_, u)| u.as_deref() != Some(uid));
        let index = active_name.and_then(|name| list.iter().position(|d| d.0 == name));
        *self.active.get_mut(direction) = index;
    }

    fn device_json(&self, direction: Direction) -> Value {
        Value::Array(
            self.devices
                .get(direction)
                .iter()
                .map(|(name, uid)| json!({"name": name, "uid": uid.clone().unwrap_or_default()}))
                .collect(),
        )
    }

    fn active_json(&self, direction: Direction) -> Value {
        let active = (*self.active.get(direction))
            .and_then(|i| self.devices.get(direction).get(i).map(|d| (i, d)));
        match active {
            Some((index, (name, uid))) => json!({
                "name": name,
                "index": index,
                "uid": uid.clone().unwrap_or_default()
            }),
            None => json!({"name": null, "index": -1}),
        }
    }

    fn activate(&mut self, direction: Direction, index: Option<usize>) -> Value {
        match index.filter(|i| *i < self.devices.get(direction).len()) {
            Some(i) => {
                *self.active.get_mut(direction) = Some(i);
                json!({"success": true, "device": self.devices.get(direction)[i].0})
            }
            None => json!({"success": false, "error": "Device not found"}),
        }
    }
}

/// In-memory automation service implementing [`Transport`]
pub(crate) struct FakeService {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
}

impl FakeService {
    /// Inputs `MacBook Mic`/`USB Mic`, outputs `Speakers` (uid A, active)
    /// and `Headphones` (uid B); nothing muted
    pub fn speakers_and_headphones() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                healthy: true,
                devices: Directional {
                    input: vec![
                        ("MacBook Mic".into(), Some("M1".into())),
                        ("USB Mic".into(), Some("M2".into())),
                    ],
                    output: vec![
                        ("Speakers".into(), Some("A".into())),
                        ("Headphones".into(), Some("B".into())),
                    ],
                },
                active: Directional {
                    input: Some(0),
                    output: Some(0),
                },
                muted: Directional::default(),
                caffeine: false,
                cpu: Some((1, "62°C".into(), "Medium".into())),
                modal_shown: true,
                llm_models: vec!["mlx-community/Qwen3-8B".into()],
                llm_servers: Vec::new(),
                llm_loading: Vec::new(),
                llm_ready_after: 2,
                llm_status_calls: 0,
                llm_start_reply: None,
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
        })
    }

    /// Same as above plus a third output `USB DAC` (uid C)
    pub fn three_outputs() -> Arc<Self> {
        let service = Self::speakers_and_headphones();
        service
            .state()
            .add_device(Direction::Output, "USB DAC", Some("C"));
        service
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Every endpoint called so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, fragment: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(fragment)).count()
    }

    /// State-changing calls only
    pub fn mutations(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| {
                c.ends_with("/set")
                    || c.ends_with("/toggle")
                    || c.starts_with("/llm/start")
                    || c.starts_with("/llm/stop")
            })
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Time out every call whose path contains `fragment`
    pub fn fail_on(&self, fragment: &str) {
        self.failures.lock().push(fragment.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Delay every response (use with a paused clock)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    fn respond(&self, endpoint: &Endpoint) -> Result<Value, TransportError> {
        let segments: Vec<&str> = endpoint.segments().iter().map(String::as_str).collect();
        let query = |key: &str| {
            endpoint
                .query_pairs()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let mut state = self.state.lock();
        if !state.healthy {
            return Err(TransportError::Request("connection refused".into()));
        }

        let body = match segments.as_slice() {
            ["health"] => json!({"status": "ok"}),
            ["audio", "devices", "list"] => json!({
                "success": true,
                "devices": {
                    "input": state.device_json(Direction::Input),
                    "output": state.device_json(Direction::Output),
                }
            }),
            ["audio", "status"] => json!({
                "input": state.active_json(Direction::Input),
                "output": state.active_json(Direction::Output),
            }),
            ["audio", dir, "mute", "status"] => {
                let direction = parse_direction(dir)?;
                json!({"muted": *state.muted.get(direction)})
            }
            ["audio", dir, "mute", "toggle"] => {
                let direction = parse_direction(dir)?;
                let muted = state.muted.get_mut(direction);
                *muted = !*muted;
                json!({"success": true, "muted": *muted})
            }
            ["audio", dir, "uid", uid, "set"] => {
                let direction = parse_direction(dir)?;
                let index = state
                    .devices
                    .get(direction)
                    .iter()
                    .position(|(_, u)| u.as_deref() == Some(*uid));
                state.activate(direction, index)
            }
            ["audio", dir, "index", n, "set"] => {
                let direction = parse_direction(dir)?;
                let index = n.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                state.activate(direction, index)
            }
            ["audio", dir, name, "set"] => {
                let direction = parse_direction(dir)?;
                let index = state
                    .devices
                    .get(direction)
                    .iter()
                    .position(|(n, _)| n == name);
                state.activate(direction, index)
            }
            ["system", "caffeine", "status"] => json!({"active": state.caffeine}),
            ["system", "caffeine", "toggle"] => {
                state.caffeine = !state.caffeine;
                json!({"success": true, "active": state.caffeine})
            }
            ["cpu", "status"] => match &state.cpu {
                Some((level, display, label)) => {
                    json!({"state": level, "tempDisplay": display, "label": label})
                }
                None => return Err(TransportError::Request("sensor offline".into())),
            },
            ["cpu", "show-modal"] | ["llm", "dashboard"] => {
                if state.modal_shown {
                    json!({"shown": true})
                } else {
                    json!({"shown": false, "error": "Alert already open"})
                }
            }
            ["llm", "list"] => json!({
                "models": state
                    .llm_models
                    .iter()
                    .map(|m| json!({"id": m, "name": m}))
                    .collect::<Vec<_>>(),
                "freeRAM": 24,
                "totalRAM": 64,
            }),
            ["llm", "status"] => match (query("model"), query("port")) {
                (Some(model), Some(port)) => {
                    let port: u16 = port.parse().unwrap_or_default();
                    state.llm_status_calls += 1;
                    if state.llm_status_calls >= state.llm_ready_after {
                        let ready: Vec<_> = state.llm_loading.drain(..).collect();
                        state.llm_servers.extend(ready);
                    }
                    match state
                        .llm_servers
                        .iter()
                        .find(|(m, p, _)| *m == model && *p == port)
                    {
                        Some((_, port, engine)) => {
                            json!({"running": true, "type": engine, "port": port})
                        }
                        None => json!({"running": false}),
                    }
                }
                _ => json!({
                    "servers": state
                        .llm_servers
                        .iter()
                        .map(|(m, p, e)| json!({"model": m, "port": p, "type": e}))
                        .collect::<Vec<_>>()
                }),
            },
            ["llm", "start"] => {
                if let Some(reply) = state.llm_start_reply.clone() {
                    reply
                } else {
                    let model = query("model").unwrap_or_default();
                    let port: u16 = query("port").and_then(|p| p.parse().ok()).unwrap_or_default();
                    let engine = query("engine").unwrap_or_default();
                    match state.llm_servers.iter().find(|(_, p, _)| *p == port) {
                        Some((m, _, e)) if *m == model => {
                            json!({"success": true, "running": true, "type": e, "port": port})
                        }
                        Some(_) => json!({
                            "success": false,
                            "portConflict": true,
                            "error": format!("Port {} in use", port)
                        }),
                        None => {
                            state.llm_status_calls = 0;
                            state.llm_loading.push((model, port, engine.clone()));
                            json!({"success": true, "type": engine, "port": port})
                        }
                    }
                }
            }
            ["llm", "stop"] => {
                let port: u16 = query("port").and_then(|p| p.parse().ok()).unwrap_or_default();
                state.llm_servers.retain(|(_, p, _)| *p != port);
                json!({"success": true})
            }
            _ => return Err(TransportError::Status { status: 404 }),
        };

        Ok(body)
    }
}

fn parse_direction(segment: &str) -> Result<Direction, TransportError> {
    match segment {
        "input" => Ok(Direction::Input),
        "output" => Ok(Direction::Output),
        _ => Err(TransportError::Status { status: 404 }),
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn call(&self, endpoint: &Endpoint, options: CallOptions) -> Result<Value, TransportError> {
        let path = endpoint.to_string();
        self.calls.lock().push(path.clone());

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failures.lock().iter().any(|f| path.contains(f.as_str())) {
            return Err(TransportError::Timeout {
                after_ms: options.timeout.as_millis() as u64,
            });
        }

        self.respond(endpoint)
    }
}

pub(crate) fn fake_registry(service: &Arc<FakeService>) -> Arc<DeviceRegistry> {
    fake_registry_with(service, PollSettings::default())
}

pub(crate) fn fake_registry_with(
    service: &Arc<FakeService>,
    poll_settings: PollSettings,
) -> Arc<DeviceRegistry> {
    let transport: Arc<dyn Transport> = service.clone();
    let client = ServiceClient::new(transport, CallPolicy::default());
    DeviceRegistry::new(client, EventBus::new(), poll_settings)
}

/// Outbound call captured by [`RecordingHost`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCall {
    State {
        context: String,
        state: u8,
        label: Option<String>,
    },
    Title {
        context: String,
        title: String,
    },
    Toast {
        context: String,
        message: String,
    },
    Params {
        context: String,
        params: Value,
    },
}

/// [`DeckHost`] that remembers everything it was asked to do
#[derive(Default)]
pub(crate) struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn states(&self, ctx: &str) -> Vec<u8> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::State { context, state, .. } if context == ctx => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn last_state(&self, ctx: &str) -> Option<u8> {
        self.states(ctx).last().copied()
    }

    pub fn last_label(&self, ctx: &str) -> Option<String> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            HostCall::State { context, label, .. } if context == ctx => label.clone(),
            _ => None,
        })
    }

    pub fn titles(&self, ctx: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::Title { context, title } if context == ctx => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn toasts(&self, ctx: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::Toast { context, message } if context == ctx => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn params(&self, ctx: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::Params { context, params } if context == ctx => Some(params.clone()),
                _ => None,
            })
            .collect()
    }
}

impl DeckHost for RecordingHost {
    fn set_state(&self, context: &str, state: u8, label: Option<&str>) {
        self.calls.lock().push(HostCall::State {
            context: context.to_string(),
            state,
            label: label.map(str::to_string),
        });
    }

    fn set_title(&self, context: &str, title: &str) {
        self.calls.lock().push(HostCall::Title {
            context: context.to_string(),
            title: title.to_string(),
        });
    }

    fn toast(&self, context: &str, message: &str) {
        self.calls.lock().push(HostCall::Toast {
            context: context.to_string(),
            message: message.to_string(),
        });
    }

    fn send_params(&self, context: &str, params: Value) {
        self.calls.lock().push(HostCall::Params {
            context: context.to_string(),
            params,
        });
    }
}

/// Context for one button wired to the fakes
pub(crate) fn action_context(
    context: &str,
    registry: &Arc<DeviceRegistry>,
    host: &Arc<RecordingHost>,
) -> ActionContext {
    let host: Arc<dyn DeckHost> = host.clone();
    ActionContext::new(
        context,
        host,
        Arc::clone(registry),
        Arc::new(AppConfig::default()),
    )
}

/// Let spawned tasks run to their next await point
pub(crate) async fn settle_tasks() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
