//! Structured log sink for orchestration events.
//!
//! [`EventLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every received event through `tracing`. It runs as a long-lived
//! background task and stops when the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::{OrchestrationEvent, EVENT_FAILED, EVENT_TERMINATED};

/// Background service that mirrors orchestration events into the log.
pub struct EventLog;

impl EventLog {
    /// Run the log loop until the channel closes.
    ///
    /// Returns the number of events written, which tests use to confirm
    /// delivery.
    pub async fn run(mut receiver: broadcast::Receiver<OrchestrationEvent>) -> u64 {
        let mut written = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::write(&event);
                    written += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event log shutting down");
                    break;
                }
            }
        }
        written
    }

    fn write(event: &OrchestrationEvent) {
        let stage = event.stage.map(|s| s.to_string()).unwrap_or_default();
        match event.event_type.as_str() {
            EVENT_FAILED | EVENT_TERMINATED => tracing::warn!(
                event_type = %event.event_type,
                instance_id = %event.instance_id,
                stage = %stage,
                payload = %event.payload,
                "Orchestration event",
            ),
            _ => tracing::info!(
                event_type = %event.event_type,
                instance_id = %event.instance_id,
                stage = %stage,
                payload = %event.payload,
                "Orchestration event",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use tabrun_core::job::InstanceId;

    use super::*;
    use crate::bus::{EventBus, EVENT_COMPLETED, EVENT_STARTED};

    #[tokio::test]
    async fn logs_until_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLog::run(bus.subscribe()));

        let id = InstanceId::derive("srv", "model");
        bus.publish(OrchestrationEvent::new(EVENT_STARTED, id.clone()));
        bus.publish(OrchestrationEvent::new(EVENT_COMPLETED, id));
        drop(bus);

        let written = handle.await.expect("event log task");
        assert_eq!(written, 2);
    }
}
