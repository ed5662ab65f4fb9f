//! State of one orchestration instance and its status projection.
//!
//! Transitions are plain synchronous methods; the registry serializes them
//! behind the instance's lock. Every output stored here has already been
//! redacted by the orchestrator.

use chrono::Utc;
use serde::Serialize;
use tabrun_core::job::{InstanceId, JobDescriptor};
use tabrun_core::runtime_status::{RuntimeStatus, STATUS_ALL_COMPLETED};
use tabrun_core::stage::{aggregate_output, Stage, StageResult, STAGE_COUNT};
use tabrun_core::types::Timestamp;

/// One run of the full pipeline for one identity.
#[derive(Debug, Clone)]
pub struct OrchestrationInstance {
    pub instance_id: InstanceId,
    pub descriptor: JobDescriptor,
    /// Number of committed stages, `0..=4`.
    pub current_stage: usize,
    pub runtime_status: RuntimeStatus,
    pub custom_status: Option<String>,
    /// Committed stage results in stage order, plus the failing result if
    /// the run failed.
    pub results: Vec<StageResult>,
    /// Aggregated output when completed, failing stage output when failed.
    pub output: Option<String>,
    pub failed_stage: Option<Stage>,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
}

impl OrchestrationInstance {
    pub fn new(descriptor: JobDescriptor) -> Self {
        let now = Utc::now();
        Self {
            instance_id: descriptor.instance_id(),
            descriptor,
            current_stage: 0,
            runtime_status: RuntimeStatus::Running,
            custom_status: None,
            results: Vec::with_capacity(STAGE_COUNT),
            output: None,
            failed_stage: None,
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn begin_stage(&mut self, stage: Stage) {
        self.custom_status = Some(stage.status_text());
        self.touch();
    }

    pub fn commit_stage(&mut self, result: StageResult) {
        self.results.push(result);
        self.current_stage = self.results.len();
        self.touch();
    }

    /// Mark the run completed and return the aggregated output.
    pub fn complete(&mut self) -> String {
        let output = aggregate_output(&self.results);
        self.output = Some(output.clone());
        self.runtime_status = RuntimeStatus::Completed;
        self.custom_status = Some(STATUS_ALL_COMPLETED.to_string());
        self.touch();
        output
    }

    /// Record the failing stage's result and stop the run.
    pub fn fail(&mut self, failure: StageResult) {
        let stage = failure.stage;
        self.output = Some(failure.output.clone());
        self.results.push(failure);
        self.failed_stage = Some(stage);
        self.runtime_status = RuntimeStatus::Failed;
        self.custom_status = Some(format!(
            "Failed at {}/{STAGE_COUNT}: {stage}",
            stage.index() + 1
        ));
        self.touch();
    }

    pub fn terminate(&mut self, reason: &str) {
        self.runtime_status = RuntimeStatus::Terminated;
        self.custom_status = Some(reason.to_string());
        self.touch();
    }

    /// Stages whose results were committed successfully.
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.stage)
            .collect()
    }

    /// Stages that never ran and never will.
    pub fn skipped_stages(&self) -> Vec<Stage> {
        match self.runtime_status {
            RuntimeStatus::Running | RuntimeStatus::Completed => Vec::new(),
            RuntimeStatus::Failed => self
                .failed_stage
                .map(|s| s.following().to_vec())
                .unwrap_or_default(),
            RuntimeStatus::Terminated => Stage::ALL[self.current_stage.min(STAGE_COUNT)..].to_vec(),
        }
    }

    pub fn status(&self) -> InstanceStatus {
        InstanceStatus {
            instance_id: self.instance_id.clone(),
            runtime_status: self.runtime_status,
            custom_status: self.custom_status.clone(),
            output: self.output.clone(),
            current_stage: self.current_stage,
            completed_stages: self.completed_stages(),
            failed_stage: self.failed_stage,
            skipped_stages: self.skipped_stages(),
            results: self.results.clone(),
            input: self.descriptor.clone(),
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
        }
    }

    fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }
}

/// Read-only snapshot served to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub instance_id: InstanceId,
    pub runtime_status: RuntimeStatus,
    pub custom_status: Option<String>,
    pub output: Option<String>,
    pub current_stage: usize,
    pub completed_stages: Vec<Stage>,
    pub failed_stage: Option<Stage>,
    pub skipped_stages: Vec<Stage>,
    pub results: Vec<StageResult>,
    pub input: JobDescriptor,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
