//! The fixed four-stage pipeline and the values exchanged per stage call.
//!
//! Stage order is not configurable. [`Stage::ALL`] is the single source of
//! truth for sequencing; the orchestrator walks it front to back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::JobDescriptor;

/// Separator placed between stage outputs in the aggregated result.
pub const OUTPUT_SEPARATOR: &str =
    "\n----------------------------------------------------------------\n";

/// Number of stages in every run.
pub const STAGE_COUNT: usize = 4;

/// One step of the batch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Partition,
    Process,
    Defragment,
    Quality,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Partition,
        Stage::Process,
        Stage::Defragment,
        Stage::Quality,
    ];

    /// Zero-based position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        match self {
            Stage::Partition => 0,
            Stage::Process => 1,
            Stage::Defragment => 2,
            Stage::Quality => 3,
        }
    }

    /// Script file run by the tool for this stage.
    pub fn script(self) -> &'static str {
        match self {
            Stage::Partition => "AutoPartitioning.csx",
            Stage::Process => "ProcessBatches.csx",
            Stage::Defragment => "DefragmentTablesWithPartitions.csx",
            Stage::Quality => "DataQualityChecks.csx",
        }
    }

    /// Human-readable stage name.
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Partition => "Partition Manager",
            Stage::Process => "Processing Manager",
            Stage::Defragment => "Partition Defragmentation",
            Stage::Quality => "Data Quality Manager",
        }
    }

    /// Custom status shown while this stage runs.
    pub fn status_text(self) -> String {
        let position = self.index() + 1;
        match self {
            Stage::Defragment => format!("{position}/{STAGE_COUNT}: Defragmenting Partitions"),
            other => format!("{position}/{STAGE_COUNT}: Running {}", other.display_name()),
        }
    }

    /// Stages that come after this one.
    pub fn following(self) -> &'static [Stage] {
        &Stage::ALL[self.index() + 1..]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// Per-call values
// ---------------------------------------------------------------------------

/// Input of one stage invocation. Built per call, dropped once it returns.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub descriptor: JobDescriptor,
    pub stage: Stage,
}

impl StageRequest {
    pub fn new(descriptor: &JobDescriptor, stage: Stage) -> Self {
        Self {
            descriptor: descriptor.clone(),
            stage,
        }
    }

    pub fn script(&self) -> &'static str {
        self.stage.script()
    }

    /// Batch parameter handed to the script.
    pub fn batch_name(&self) -> &str {
        &self.descriptor.batch_name
    }
}

/// Outcome of one stage invocation as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub output: String,
    pub success: bool,
    /// Exit code reported by the tool; `-1` when no process exit was observed.
    pub exit_code: i32,
}

impl StageResult {
    pub fn succeeded(stage: Stage, output: impl Into<String>) -> Self {
        Self {
            stage,
            output: output.into(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(stage: Stage, output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stage,
            output: output.into(),
            success: false,
            exit_code,
        }
    }
}

/// Join stage outputs in order with [`OUTPUT_SEPARATOR`].
pub fn aggregate_output(results: &[StageResult]) -> String {
    results
        .iter()
        .map(|r| r.output.as_str())
        .collect::<Vec<_>>()
        .join(OUTPUT_SEPARATOR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn status_texts_match_progress_format() {
        let texts: Vec<String> = Stage::ALL.iter().map(|s| s.status_text()).collect();
        assert_eq!(
            texts,
            vec![
                "1/4: Running Partition Manager",
                "2/4: Running Processing Manager",
                "3/4: Defragmenting Partitions",
                "4/4: Running Data Quality Manager",
            ]
        );
    }

    #[test]
    fn each_stage_has_distinct_script() {
        let mut scripts: Vec<&str> = Stage::ALL.iter().map(|s| s.script()).collect();
        scripts.sort();
        scripts.dedup();
        assert_eq!(scripts.len(), STAGE_COUNT);
        assert!(scripts.iter().all(|s| s.ends_with(".csx")));
    }

    #[test]
    fn following_stages() {
        assert_eq!(
            Stage::Process.following(),
            &[Stage::Defragment, Stage::Quality]
        );
        assert!(Stage::Quality.following().is_empty());
    }

    #[test]
    fn aggregate_joins_in_order() {
        let results: Vec<StageResult> = Stage::ALL
            .iter()
            .zip(["A", "B", "C", "D"])
            .map(|(stage, out)| StageResult::succeeded(*stage, out))
            .collect();

        let expected = ["A", "B", "C", "D"].join(OUTPUT_SEPARATOR);
        assert_eq!(aggregate_output(&results), expected);
    }

    #[test]
    fn request_carries_batch_name() {
        let descriptor = JobDescriptor::new("asazure://x", "srv", "m", "nightly");
        let request = StageRequest::new(&descriptor, Stage::Process);
        assert_eq!(request.batch_name(), "nightly");
        assert_eq!(request.script(), "ProcessBatches.csx");
    }
}
