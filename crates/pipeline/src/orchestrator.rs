//! Four-stage orchestration state machine.
//!
//! [`Orchestrator`] admits descriptors through the [`InstanceRegistry`],
//! spawns one task per admitted instance, and drives the stages in order:
//!
//! ```text
//! Partition -> Process -> Defragment -> Quality -> Done
//!      \           \            \            \
//!       +-----------+------------+------------+--> Failed
//! ```
//!
//! Every stage call is wrapped in [`retry_with_backoff_notify`]. The first
//! stage that still fails once its attempts are spent ends the run; later
//! stages are never invoked. All stage output is redacted before it reaches
//! the instance state or the event bus.

use std::sync::Arc;
use std::time::Duration;

use tabrun_core::error::CoreError;
use tabrun_core::job::{InstanceId, JobDescriptor};
use tabrun_core::redact::Redactor;
use tabrun_core::retry::{retry_with_backoff_notify, RetryPolicy};
use tabrun_core::runtime_status::STATUS_TERMINATED_BY_SHUTDOWN;
use tabrun_core::scripting::executor::StageExecutor;
use tabrun_core::stage::{Stage, StageRequest, StageResult};
use tabrun_events::bus::{
    EventBus, OrchestrationEvent, EVENT_COMPLETED, EVENT_FAILED, EVENT_STAGE_COMPLETED,
    EVENT_STAGE_RETRYING, EVENT_STAGE_STARTED, EVENT_STARTED, EVENT_TERMINATED,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::PipelineError;
use crate::instance::InstanceStatus;
use crate::registry::{InstanceHandle, InstanceRegistry};

/// Exit code recorded when the executor could not run the stage at all.
const NO_EXIT_CODE: i32 = -1;

/// Runs pipeline instances and owns their tasks.
///
/// Created once at startup and shared as `Arc<Orchestrator>`.
pub struct Orchestrator {
    registry: Arc<InstanceRegistry>,
    executor: Arc<dyn StageExecutor>,
    redactor: Redactor,
    policy: RetryPolicy,
    events: Arc<EventBus>,
    /// Master cancellation token, cancelled by [`shutdown`](Self::shutdown).
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn StageExecutor>,
        redactor: Redactor,
        policy: RetryPolicy,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry: Arc::new(InstanceRegistry::new()),
            executor,
            redactor,
            policy,
            events,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Validate, admit, and schedule a new run.
    ///
    /// Returns as soon as the instance is registered; the stages run on a
    /// background task.
    pub async fn start(
        self: &Arc<Self>,
        descriptor: JobDescriptor,
    ) -> Result<InstanceId, PipelineError> {
        descriptor.validate().map_err(|e| match e {
            CoreError::Validation(msg) => PipelineError::Validation(msg),
            other => PipelineError::Validation(other.to_string()),
        })?;

        let handle = self.registry.submit(descriptor.clone()).await?;
        let instance_id = handle.id().clone();

        tracing::info!(
            instance_id = %instance_id,
            server = %descriptor.server,
            model = %descriptor.model,
            batch_name = %descriptor.batch_name,
            target = ?descriptor.connection_target(),
            "Orchestration started",
        );
        self.events.publish(
            OrchestrationEvent::new(EVENT_STARTED, instance_id.clone()).with_payload(
                serde_json::json!({
                    "server": descriptor.server,
                    "model": descriptor.model,
                    "batch_name": descriptor.batch_name,
                    "connection_target": descriptor.connection_target(),
                }),
            ),
        );

        let this = Arc::clone(self);
        self.tracker.spawn(async move { this.drive(handle).await });

        Ok(instance_id)
    }

    /// Status snapshot of one instance.
    pub async fn status(&self, id: &InstanceId) -> Option<InstanceStatus> {
        self.registry.status(id).await
    }

    /// Wait for an instance to reach a terminal status and return its final
    /// snapshot.
    pub async fn wait(&self, id: &InstanceId) -> Option<InstanceStatus> {
        let handle = self.registry.get(id).await?;
        handle.wait_terminal().await;
        Some(handle.status().await)
    }

    /// Cancel every in-flight run and wait up to `timeout` for the tasks to
    /// finish. Returns `false` if the timeout elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        self.cancel.cancel();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("All orchestration tasks stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "Orchestration tasks still running after shutdown timeout",
                );
                false
            }
        }
    }

    /// Drive one instance to a terminal status, or terminate it on shutdown.
    async fn drive(&self, handle: InstanceHandle) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => self.terminate(&handle).await,
            result = self.run(&handle) => match result {
                Ok(_) => tracing::info!(instance_id = %handle.id(), "Orchestration completed"),
                Err(e) => tracing::warn!(instance_id = %handle.id(), error = %e, "Orchestration failed"),
            },
        }
    }

    /// Run all stages of one instance in order.
    ///
    /// Returns the aggregated output on success. On the first stage that
    /// fails after retries, the failure is recorded on the instance and
    /// returned as [`PipelineError::StageExecution`].
    pub async fn run(&self, handle: &InstanceHandle) -> Result<String, PipelineError> {
        let descriptor = handle.descriptor().await;
        let instance_id = handle.id().clone();

        for stage in Stage::ALL {
            handle.update(|i| i.begin_stage(stage)).await;
            tracing::info!(instance_id = %instance_id, stage = %stage, "{}", stage.status_text());
            self.events
                .publish(OrchestrationEvent::new(EVENT_STAGE_STARTED, instance_id.clone()).with_stage(stage));

            let request = StageRequest::new(&descriptor, stage);
            let outcome = retry_with_backoff_notify(
                &self.policy,
                |attempt| self.attempt(&request, attempt),
                |next_attempt, failure: &StageResult| {
                    tracing::warn!(
                        instance_id = %instance_id,
                        stage = %stage,
                        exit_code = failure.exit_code,
                        next_attempt,
                        "Stage failed, retrying",
                    );
                    self.events.publish(
                        OrchestrationEvent::new(EVENT_STAGE_RETRYING, instance_id.clone())
                            .with_stage(stage)
                            .with_payload(serde_json::json!({
                                "attempt": next_attempt,
                                "exit_code": failure.exit_code,
                            })),
                    );
                },
            )
            .await;

            match outcome {
                Ok(result) => {
                    handle.update(|i| i.commit_stage(result)).await;
                    self.events.publish(
                        OrchestrationEvent::new(EVENT_STAGE_COMPLETED, instance_id.clone())
                            .with_stage(stage),
                    );
                }
                Err(failure) => {
                    let error = PipelineError::StageExecution {
                        stage,
                        exit_code: failure.exit_code,
                        output: failure.output.clone(),
                    };
                    let exit_code = failure.exit_code;
                    handle.update(|i| i.fail(failure)).await;
                    self.events.publish(
                        OrchestrationEvent::new(EVENT_FAILED, instance_id.clone())
                            .with_stage(stage)
                            .with_payload(serde_json::json!({
                                "exit_code": exit_code,
                                "skipped_stages": stage.following(),
                            })),
                    );
                    return Err(error);
                }
            }
        }

        let output = handle.update(|i| i.complete()).await;
        self.events
            .publish(OrchestrationEvent::new(EVENT_COMPLETED, instance_id));
        Ok(output)
    }

    /// One stage call. Any unsuccessful outcome becomes an `Err` carrying a
    /// redacted failure result so the retry wrapper treats it uniformly.
    async fn attempt(&self, request: &StageRequest, attempt: u32) -> Result<StageResult, StageResult> {
        let stage = request.stage;
        tracing::debug!(stage = %stage, attempt, "Invoking stage");

        match self.executor.execute(request).await {
            Ok(result) => {
                let result = StageResult {
                    output: self.redactor.redact(&result.output),
                    ..result
                };
                if result.success {
                    Ok(result)
                } else {
                    Err(result)
                }
            }
            Err(e) => {
                let output = format!("Stage {} could not run: {e}", stage.display_name());
                Err(StageResult::failed(stage, self.redactor.redact(&output), NO_EXIT_CODE))
            }
        }
    }

    async fn terminate(&self, handle: &InstanceHandle) {
        let terminated = handle
            .update(|i| {
                if i.runtime_status.is_terminal() {
                    false
                } else {
                    i.terminate(STATUS_TERMINATED_BY_SHUTDOWN);
                    true
                }
            })
            .await;

        if terminated {
            tracing::warn!(instance_id = %handle.id(), "Orchestration terminated by shutdown");
            self.events.publish(
                OrchestrationEvent::new(EVENT_TERMINATED, handle.id().clone())
                    .with_payload(serde_json::json!({ "reason": STATUS_TERMINATED_BY_SHUTDOWN })),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tabrun_core::runtime_status::RuntimeStatus;
    use tabrun_core::scripting::executor::StageError;

    use super::*;

    /// Executor that fails every call to a single stage with a spawn error.
    struct BrokenStage(Stage);

    #[async_trait]
    impl StageExecutor for BrokenStage {
        async fn execute(&self, request: &StageRequest) -> Result<StageResult, StageError> {
            if request.stage == self.0 {
                Err(StageError::NotFound("/opt/te/TabularEditor.exe".into()))
            } else {
                Ok(StageResult::succeeded(request.stage, "ok"))
            }
        }
    }

    fn orchestrator(executor: impl StageExecutor + 'static) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Arc::new(executor),
            Redactor::default(),
            RetryPolicy::no_retry(),
            Arc::new(EventBus::default()),
        ))
    }

    #[tokio::test]
    async fn executor_error_becomes_failed_stage_output() {
        let orch = orchestrator(BrokenStage(Stage::Defragment));
        let id = orch
            .start(JobDescriptor::new("asazure://x", "srv1", "m1", "b1"))
            .await
            .expect("start");

        let status = orch.wait(&id).await.expect("status");
        assert_eq!(status.runtime_status, RuntimeStatus::Failed);
        assert_eq!(status.failed_stage, Some(Stage::Defragment));
        assert_eq!(status.results.last().map(|r| r.exit_code), Some(NO_EXIT_CODE));
        let output = status.output.expect("output");
        assert!(output.contains("Partition Defragmentation could not run"));
        assert!(output.contains("Not found: /opt/te/TabularEditor.exe"));
    }

    #[tokio::test]
    async fn invalid_descriptor_is_rejected_before_admission() {
        let orch = orchestrator(BrokenStage(Stage::Partition));
        let result = orch.start(JobDescriptor::new("", "srv1", "m1", "b1")).await;

        assert!(matches!(result, Err(PipelineError::Validation(msg)) if msg.contains("BaseURL")));
        assert!(orch.registry().list().await.is_empty());
    }
}
