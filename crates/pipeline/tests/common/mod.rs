#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tabrun_core::job::JobDescriptor;
use tabrun_core::redact::Credentials;
use tabrun_core::retry::RetryPolicy;
use tabrun_core::scripting::executor::{StageError, StageExecutor};
use tabrun_core::stage::{Stage, StageRequest, StageResult, STAGE_COUNT};
use tabrun_events::EventBus;
use tabrun_pipeline::Orchestrator;
use tokio::sync::Semaphore;

pub const CLIENT_ID: &str = "client-abc";
pub const TENANT_ID: &str = "tenant-xyz";
pub const CLIENT_SECRET: &str = "hunter2";

/// Scripted result of one mock stage call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed(String),
    Fail(String, i32),
    Error,
}

/// Stage executor with per-stage scripted outcomes and call counters.
///
/// Stages without a scripted outcome succeed with their display name as
/// output. With a gate, every call waits for a semaphore permit before
/// returning.
#[derive(Default)]
pub struct MockExecutor {
    scripted: Mutex<HashMap<Stage, VecDeque<Outcome>>>,
    calls: [AtomicU32; STAGE_COUNT],
    gate: Option<Arc<Semaphore>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, stage: Stage, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .extend(outcomes);
        self
    }

    /// Every stage succeeds once with the given output.
    pub fn outputs(mut self, outputs: [&str; STAGE_COUNT]) -> Self {
        for (stage, output) in Stage::ALL.into_iter().zip(outputs) {
            self = self.script(stage, [Outcome::Succeed(output.to_string())]);
        }
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self, stage: Stage) -> u32 {
        self.calls[stage.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        Stage::ALL.into_iter().map(|s| self.calls(s)).sum()
    }

    /// Yield until `stage` has been invoked at least once.
    pub async fn entered(&self, stage: Stage) {
        while self.calls(stage) == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl StageExecutor for MockExecutor {
    async fn execute(&self, request: &StageRequest) -> Result<StageResult, StageError> {
        let stage = request.stage;
        self.calls[stage.index()].fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        let next = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Outcome::Succeed(output)) => Ok(StageResult::succeeded(stage, output)),
            Some(Outcome::Fail(output, code)) => Ok(StageResult::failed(stage, output, code)),
            Some(Outcome::Error) => Err(StageError::Timeout { elapsed_ms: 1000 }),
            None => Ok(StageResult::succeeded(stage, stage.display_name())),
        }
    }
}

pub fn descriptor() -> JobDescriptor {
    JobDescriptor::new("asazure://x", "srv1", "m1", "b1")
}

/// Retry policy with production attempts but no delay.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::ZERO)
}

pub fn build_orchestrator(executor: Arc<MockExecutor>, policy: RetryPolicy) -> Arc<Orchestrator> {
    let redactor = Credentials::new(CLIENT_ID, TENANT_ID, CLIENT_SECRET).redactor();
    Arc::new(Orchestrator::new(
        executor,
        redactor,
        policy,
        Arc::new(EventBus::default()),
    ))
}
