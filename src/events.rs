//! Event bus - synchronous one-to-many notifications
//!
//! The registry publishes cache changes here and every button re-renders in
//! its listener. Dispatch happens on the publisher's call stack, in
//! subscription order. Listeners may publish or (un)subscribe from inside a
//! callback: the listener list is snapshotted before dispatch.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::registry::Direction;

/// Closed set of notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Health probe succeeded
    Connected,
    /// Health probe failed, syncing is suspended
    Disconnected,
    /// Device lists were (re)loaded, possibly unchanged
    DevicesLoaded,
    /// The active device of a direction changed
    ActiveChanged {
        direction: Direction,
        name: Option<String>,
    },
    /// The mute flag of a direction changed
    MuteChanged { direction: Direction, muted: bool },
    /// Initial connect sequence completed
    StatusLoaded,
    /// A button asked background-process buttons to re-query
    RefreshRequested,
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusInner {
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

/// Cloneable publish/subscribe channel
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; keep the id to unsubscribe on teardown
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Deliver a notification to every current listener
    pub fn publish(&self, notification: Notification) {
        let snapshot: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        trace!("📣 {:?} → {} listener(s)", notification, snapshot.len());

        for listener in snapshot {
            listener(&notification);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}
