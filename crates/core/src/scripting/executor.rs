//! Stage executor contract and shared command types.
//!
//! Defines [`StageExecutor`], the trait the orchestrator drives once per
//! stage attempt, along with [`CommandInput`], [`CommandOutput`], and
//! [`StageError`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::stage::{StageRequest, StageResult};

/// Everything a child process needs besides its program path.
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
    /// Positional arguments, passed without shell interpretation.
    pub args: Vec<String>,
    /// Environment variables set on the child only.
    pub env_vars: Vec<(String, String)>,
    /// Working directory for the child process (uses current dir if `None`).
    pub working_directory: Option<String>,
    /// Wall-clock limit before the process is killed. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Captured output from a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Failures that prevented a stage from producing an exit code.
///
/// A tool that runs and exits non-zero is not a `StageError`; it yields a
/// [`StageResult`] with `success == false`.
#[derive(Debug)]
pub enum StageError {
    /// The tool executable or the stage script was not found.
    NotFound(String),
    /// The tool exceeded the configured timeout and was killed.
    Timeout {
        /// Elapsed wall-clock time before the process was killed.
        elapsed_ms: u64,
    },
    /// Spawning or talking to the process failed.
    Io(std::io::Error),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Not found: {path}"),
            Self::Timeout { elapsed_ms } => write!(f, "Stage timed out after {elapsed_ms}ms"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Runs one stage of the pipeline against a job descriptor.
///
/// Implementations must not retry; the orchestrator owns the retry policy.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, request: &StageRequest) -> Result<StageResult, StageError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_found() {
        let err = StageError::NotFound("/opt/te/TabularEditor.exe".to_string());
        assert_eq!(err.to_string(), "Not found: /opt/te/TabularEditor.exe");
    }

    #[test]
    fn display_timeout() {
        let err = StageError::Timeout { elapsed_ms: 5000 };
        assert_eq!(err.to_string(), "Stage timed out after 5000ms");
    }

    #[test]
    fn io_error_has_source() {
        let err = StageError::Io(std::io::Error::other("boom"));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn timeout_has_no_source() {
        let err = StageError::Timeout { elapsed_ms: 100 };
        assert!(std::error::Error::source(&err).is_none());
    }
}
