//! Typed publish/subscribe event bus.
//!
//! A single-process, no-backpressure fan-out carrying execution and module
//! lifecycle events: `execution.start/complete/error` and
//! `module.initialize/execution/dispose.start/complete/error`. Backed by
//! `tokio::sync::broadcast`.
//!
//! Listeners must not block; the bus does not await handlers — it hands
//! each subscriber its own receiver and lets them drain at their
//! own pace. A subscriber that never reads just lags and drops old events,
//! which is `broadcast`'s own overflow behavior.

use tokio::sync::broadcast;

use crate::error::Error;

/// A single event published onto the bus. `name` follows the dotted
/// `category.subject.phase` convention from spec §4.8
/// (`"execution.start"`, `"module.initialize.complete"`, …).
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Event {
            name: name.into(),
            payload,
        }
    }

    pub fn execution_start(conversation_id: &str) -> Self {
        Event::new("execution.start", serde_json::json!({ "conversationId": conversation_id }))
    }

    pub fn execution_complete(conversation_id: &str) -> Self {
        Event::new("execution.complete", serde_json::json!({ "conversationId": conversation_id }))
    }

    pub fn execution_error(conversation_id: &str, error: &Error) -> Self {
        Event::new(
            "execution.error",
            serde_json::json!({ "conversationId": conversation_id, "error": error.to_string(), "kind": error.kind() }),
        )
    }

    pub fn module_phase(module_name: &str, phase: &str, status: &str) -> Self {
        Event::new(
            format!("module.{}.{}", phase, status),
            serde_json::json!({ "module": module_name }),
        )
    }
}

/// Per-agent event bus. Not a singleton — every `Agent` owns its own
/// instance.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(256);
        EventBus { sender }
    }

    /// Subscribe to every event published from this point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers. A no-op (not an error)
    /// if there are currently no subscribers, matching `broadcast`'s own
    /// semantics.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
