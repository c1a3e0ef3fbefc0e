//! Lifecycle events emitted on every structural change to a tree.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::tree::{NodeId, QuestionSummary};

/// Fallback outcome text for a leaf whose outcome list is empty.
pub const NO_OUTCOME: &str = "No outcome specified";

/// A structural change, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeEvent {
    /// The root question was created.
    Root {
        /// The root and its answers.
        node: QuestionSummary,
    },
    /// An answer gained a child question.
    Expand {
        /// The expanded answer.
        #[serde(rename = "parentAnswerId")]
        parent_answer_id: NodeId,
        /// The new question and its answers.
        node: QuestionSummary,
    },
    /// An expansion request hit a leaf answer.
    Leaf {
        /// The leaf answer.
        #[serde(rename = "parentAnswerId")]
        parent_answer_id: NodeId,
        /// The concluded outcome.
        outcome: String,
    },
    /// Full recursive generation finished.
    Complete,
    /// A model call or response check failed.
    Error {
        /// Human-readable failure.
        message: String,
    },
}

impl TreeEvent {
    /// The `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            TreeEvent::Root { .. } => "root",
            TreeEvent::Expand { .. } => "expand",
            TreeEvent::Leaf { .. } => "leaf",
            TreeEvent::Complete => "complete",
            TreeEvent::Error { .. } => "error",
        }
    }
}

/// Receives lifecycle events synchronously, in emission order.
///
/// Implementations must not block: the generator calls `emit` inline.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: TreeEvent);
}

impl<F> EventSink for F
where
    F: Fn(TreeEvent) + Send + Sync,
{
    fn emit(&self, event: TreeEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: TreeEvent) {}
}

/// Forwards events into an unbounded channel.
///
/// Sending never waits, so this is safe to call from a generation task; the
/// receiving side observes events in the order they were emitted.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TreeEvent>,
}

impl ChannelSink {
    /// Wrap a sender.
    pub fn new(tx: mpsc::UnboundedSender<TreeEvent>) -> Self {
        Self { tx }
    }

    /// A sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TreeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TreeEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped; discarding event");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TreeEvent>>,
}

impl RecordingSink {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the events seen so far.
    pub fn events(&self) -> Vec<TreeEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// The `type` tags seen so far.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(TreeEvent::kind).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TreeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
