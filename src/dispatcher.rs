//! Host event dispatcher
//!
//! Owns the per-button action instances, keyed by the host's context id.
//! Instances are created on `Add` (or on a `Run` for a context we never
//! saw), looked up for every other event and dropped on `Clear`.
//!
//! Handlers that talk to the service are spawned so a slow click never
//! holds up the next host event.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actions::{self, Action, ActionContext, ActionKind};
use crate::config::AppConfig;
use crate::host::{is_empty_params, DeckHost, HostEvent};
use crate::registry::DeviceRegistry;

/// What [`Dispatcher::handle`] did with an event
#[derive(Debug)]
pub enum Handled {
    /// Fully handled inline
    Done,
    /// Handler running in the background
    Spawned(JoinHandle<()>),
    /// Host went away; the caller should stop its loop
    Closed,
}

impl Handled {
    pub fn is_close(&self) -> bool {
        matches!(self, Handled::Closed)
    }

    /// Wait for a spawned handler to finish
    pub async fn join(self) {
        if let Handled::Spawned(handle) = self {
            if let Err(e) = handle.await {
                warn!("⚠️  Action handler failed: {}", e);
            }
        }
    }
}

pub struct Dispatcher {
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
    host: Arc<dyn DeckHost>,
    registry: Arc<DeviceRegistry>,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    pub fn new(
        host: Arc<dyn DeckHost>,
        registry: Arc<DeviceRegistry>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
            host,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.actions.read().contains_key(context)
    }

    pub fn kind_of(&self, context: &str) -> Option<ActionKind> {
        self.actions.read().get(context).map(|a| a.kind())
    }

    /// Placed buttons, sorted by context id
    pub fn contexts(&self) -> Vec<(String, ActionKind)> {
        let mut list: Vec<_> = self
            .actions
            .read()
            .iter()
            .map(|(ctx, action)| (ctx.clone(), action.kind()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    fn get(&self, context: &str) -> Option<Arc<dyn Action>> {
        self.actions.read().get(context).cloned()
    }

    pub fn handle(&self, event: HostEvent) -> Handled {
        match event {
            HostEvent::Connected => {
                info!("🔌 Deck host connected");
                Handled::Done
            }
            HostEvent::Add {
                context,
                uuid,
                params,
            } => self.add(context, &uuid, params),
            HostEvent::Run { context, uuid } => match self.get(&context) {
                Some(action) => Handled::Spawned(tokio::spawn(async move {
                    action.on_run().await;
                })),
                None => {
                    debug!("Run for unknown context {}, registering it", context);
                    self.add(context, &uuid, Value::Null)
                }
            },
            HostEvent::SetActive { context, active } => match self.get(&context) {
                Some(action) => Handled::Spawned(tokio::spawn(async move {
                    action.on_set_active(active).await;
                })),
                None => Handled::Done,
            },
            HostEvent::ParamFromApp { context, params }
            | HostEvent::ParamFromPlugin { context, params } => {
                if is_empty_params(&params) {
                    return Handled::Done;
                }
                match self.get(&context) {
                    Some(action) => Handled::Spawned(tokio::spawn(async move {
                        action.on_params(params).await;
                    })),
                    None => Handled::Done,
                }
            }
            HostEvent::Clear { contexts } => {
                for context in contexts {
                    self.clear(&context);
                }
                Handled::Done
            }
            HostEvent::Close => {
                info!("🔌 Deck host closed");
                self.clear_all();
                Handled::Closed
            }
        }
    }

    fn add(&self, context: String, uuid: &str, params: Value) -> Handled {
        if let Some(existing) = self.get(&context) {
            return Handled::Spawned(tokio::spawn(async move {
                existing.on_add().await;
            }));
        }

        let Some(kind) = ActionKind::from_uuid(&self.config.plugin.uuid, uuid) else {
            warn!("⚠️  Unknown action '{}' for context {}", uuid, context);
            return Handled::Done;
        };

        let ctx = ActionContext::new(
            context.clone(),
            Arc::clone(&self.host),
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
        );
        let action = actions::create(kind, ctx);
        self.actions.write().insert(context.clone(), Arc::clone(&action));
        info!("➕ {} button added ({})", kind, context);

        if is_empty_params(&params) {
            Handled::Done
        } else {
            Handled::Spawned(tokio::spawn(async move {
                action.on_params(params).await;
            }))
        }
    }

    fn clear(&self, context: &str) {
        let removed = self.actions.write().remove(context);
        match removed {
            Some(action) => {
                action.on_clear();
                info!("➖ {} button removed ({})", action.kind(), context);
            }
            None => debug!("Clear for unknown context {}", context),
        }
    }

    /// Tear down every button
    pub fn clear_all(&self) {
        let drained: Vec<_> = self.actions.write().drain().collect();
        for (context, action) in drained {
            debug!("Clearing {} ({})", context, action.kind());
            action.on_clear();
        }
    }
}
