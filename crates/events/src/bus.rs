//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`OrchestrationEvent`]s,
//! shared via `Arc<EventBus>` between the orchestrator and its observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabrun_core::job::InstanceId;
use tabrun_core::stage::Stage;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A new instance was accepted and its run scheduled.
pub const EVENT_STARTED: &str = "orchestration.started";

/// A stage is about to be invoked.
pub const EVENT_STAGE_STARTED: &str = "orchestration.stage_started";

/// A stage returned successfully and its result was committed.
pub const EVENT_STAGE_COMPLETED: &str = "orchestration.stage_completed";

/// A stage attempt failed and another attempt will follow the backoff.
pub const EVENT_STAGE_RETRYING: &str = "orchestration.stage_retrying";

/// All stages completed.
pub const EVENT_COMPLETED: &str = "orchestration.completed";

/// A stage failed after retry exhaustion; later stages were skipped.
pub const EVENT_FAILED: &str = "orchestration.failed";

/// The run was interrupted before reaching a natural end.
pub const EVENT_TERMINATED: &str = "orchestration.terminated";

// ---------------------------------------------------------------------------
// OrchestrationEvent
// ---------------------------------------------------------------------------

/// One state transition of an orchestration instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationEvent {
    /// Dot-separated event name, e.g. `"orchestration.completed"`.
    pub event_type: String,

    pub instance_id: InstanceId,

    /// Stage the event concerns, if any.
    pub stage: Option<Stage>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl OrchestrationEvent {
    pub fn new(event_type: impl Into<String>, instance_id: InstanceId) -> Self {
        Self {
            event_type: event_type.into(),
            instance_id,
            stage: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Every subscriber independently receives every published event. When the
/// buffer is full, the oldest unread events are dropped and slow receivers
/// observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<OrchestrationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: OrchestrationEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> InstanceId {
        InstanceId::derive("srv1", "m1")
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = OrchestrationEvent::new(EVENT_STAGE_STARTED, id())
            .with_stage(Stage::Process)
            .with_payload(serde_json::json!({"attempt": 1}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, EVENT_STAGE_STARTED);
        assert_eq!(received.instance_id, id());
        assert_eq!(received.stage, Some(Stage::Process));
        assert_eq!(received.payload["attempt"], 1);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(OrchestrationEvent::new(EVENT_COMPLETED, id()));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, EVENT_COMPLETED);
        assert_eq!(e2.event_type, EVENT_COMPLETED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(OrchestrationEvent::new(EVENT_STARTED, id()));
    }

    #[test]
    fn default_event_has_no_stage_and_empty_payload() {
        let event = OrchestrationEvent::new(EVENT_STARTED, id());
        assert!(event.stage.is_none());
        assert!(event.payload.is_object());
    }
}
