//! Creation/deletion notifications.
//!
//! The application owns one [`EventBus`] and hands it to the [`Client`];
//! completion caches and the like subscribe to it.
//!
//! [`Client`]: crate::Client

use crate::{NodeKind, Path};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Created,
    Deleted,
}

impl Event {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown event `{other}` (expected created|deleted)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub event: Event,
    pub kind: NodeKind,
    pub path: Path,
}

pub type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<Event, Vec<Callback>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, event: Event, callback: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .entry(event)
            .or_default()
            .push(Arc::new(callback));
    }

    /// Call every subscriber of `notification.event`, in registration order.
    pub fn publish(&self, notification: &Notification) {
        // Snapshot so callbacks may register further subscribers.
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .get(&notification.event)
            .cloned()
            .unwrap_or_default();
        for callback in callbacks {
            callback(notification);
        }
    }

    pub fn subscriber_count(&self, event: Event) -> usize {
        self.subscribers.read().get(&event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("created", &self.subscriber_count(Event::Created))
            .field("deleted", &self.subscriber_count(Event::Deleted))
            .finish()
    }
}
