use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::events::TreeEvent;

/// Default number of events a slow subscriber may fall behind by.
pub const DEFAULT_HUB_CAPACITY: usize = 256;

/// Handle identifying one generation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A lifecycle event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Originating session.
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    /// The event itself, flattened next to `sessionId`.
    #[serde(flatten)]
    pub event: TreeEvent,
}

/// Process-wide fan-out of session events to notification subscribers.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    /// Create a hub buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers.
    pub fn publish(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("No event subscribers; event dropped");
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

/// Drain one session's channel into the hub, strictly in order.
///
/// The task ends when every sender for the session has been dropped.
pub(crate) fn spawn_forwarder(
    session_id: SessionId,
    mut rx: mpsc::UnboundedReceiver<TreeEvent>,
    hub: EventHub,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!(session_id = %session_id, kind = event.kind(), "Forwarding event");
            hub.publish(SessionEvent {
                session_id: session_id.clone(),
                event,
            });
        }
        debug!(session_id = %session_id, "Session event channel closed");
    });
}
