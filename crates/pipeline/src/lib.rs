//! Orchestration of the four-stage batch pipeline.
//!
//! - [`InstanceRegistry`]: the dedup gate. At most one `Running` instance
//!   per `(server, model)` identity.
//! - [`Orchestrator`]: runs the stages in order through a
//!   [`StageExecutor`](tabrun_core::scripting::executor::StageExecutor),
//!   with bounded retry per stage, and publishes every transition.
//! - [`OrchestrationInstance`] / [`InstanceStatus`]: per-instance state and
//!   its read-only projection for status queries.

pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod registry;

pub use error::PipelineError;
pub use instance::{InstanceStatus, OrchestrationInstance};
pub use orchestrator::Orchestrator;
pub use registry::{InstanceHandle, InstanceRegistry};
