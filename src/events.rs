//! # Transition Events
//!
//! Best-effort fan-out of gate transitions to connected dashboard clients.
//!
//! A single broadcast channel is shared through app state. Publishing never
//! blocks and never fails the request that triggered it: with no subscribers
//! the send result is an error we deliberately drop, and a lagging
//! subscriber only loses its own backlog. Events carry no delivery
//! guarantee and are never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Opening,
    Closing,
    Opened,
    Closed,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Opening => "opening",
            TransitionKind::Closing => "closing",
            TransitionKind::Opened => "opened",
            TransitionKind::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateEvent {
    pub gate_id: String,
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
}

pub struct EventBus {
    tx: broadcast::Sender<GateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish a transition, returning the event that was sent out.
    /// Zero connected subscribers is a normal, silent case.
    pub fn publish(&self, gate_id: &str, kind: TransitionKind) -> GateEvent {
        let event = GateEvent {
            gate_id: gate_id.to_string(),
            kind,
            timestamp: Utc::now(),
        };

        let _ = self.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATE_ID: &str = "686eb0ee9984cab163af5d5b";

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();

        let event = bus.publish(GATE_ID, TransitionKind::Opened);

        assert_eq!(event.gate_id, GATE_ID);
        assert_eq!(event.kind, TransitionKind::Opened);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(GATE_ID, TransitionKind::Closing);

        assert_eq!(first.recv().await.unwrap().kind, TransitionKind::Closing);
        assert_eq!(second.recv().await.unwrap().kind, TransitionKind::Closing);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = GateEvent {
            gate_id: GATE_ID.to_string(),
            kind: TransitionKind::Opening,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["gateId"], GATE_ID);
        assert_eq!(json["kind"], "opening");
        assert!(json["timestamp"].is_string());
    }
}
