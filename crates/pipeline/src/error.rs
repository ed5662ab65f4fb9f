use tabrun_core::error::CoreError;
use tabrun_core::job::InstanceId;
use tabrun_core::stage::Stage;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Descriptor is missing required fields. No instance was created.
    #[error("{0}")]
    Validation(String),

    /// The identity already has a running instance. Nothing was started.
    #[error("An instance with ID '{instance_id}' is already running.")]
    Conflict { instance_id: InstanceId },

    /// A stage still failed after its retry budget was spent.
    #[error("Stage '{stage}' failed with exit code {exit_code}")]
    StageExecution {
        stage: Stage,
        exit_code: i32,
        /// Redacted output of the failing attempt.
        output: String,
    },
}

impl From<PipelineError> for CoreError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => CoreError::Validation(msg),
            conflict @ PipelineError::Conflict { .. } => CoreError::Conflict(conflict.to_string()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}
