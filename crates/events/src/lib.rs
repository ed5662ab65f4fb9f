//! Orchestration event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`OrchestrationEvent`]: one transition of one orchestration instance.
//! - [`EventLog`]: background subscriber mirroring every event into the
//!   structured log.

pub mod bus;
pub mod log;

pub use bus::{EventBus, OrchestrationEvent};
pub use log::EventLog;
