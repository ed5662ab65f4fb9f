//! Lifecycle status of an orchestration instance.

use serde::{Deserialize, Serialize};

/// Well-known custom status once every stage has completed.
pub const STATUS_ALL_COMPLETED: &str = "All activities completed successfully";

/// Custom status of an instance interrupted by service shutdown.
pub const STATUS_TERMINATED_BY_SHUTDOWN: &str = "Terminated by shutdown";

/// Runtime status of an orchestration instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Running,
    Completed,
    Failed,
    Terminated,
}

impl RuntimeStatus {
    /// Terminal instances may be replaced by a new submission.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RuntimeStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!RuntimeStatus::Running.is_terminal());
        assert!(RuntimeStatus::Completed.is_terminal());
        assert!(RuntimeStatus::Failed.is_terminal());
        assert!(RuntimeStatus::Terminated.is_terminal());
    }

    #[test]
    fn serializes_as_pascal_case() {
        let json = serde_json::to_string(&RuntimeStatus::Completed).unwrap();
        assert_eq!(json, "\"Completed\"");
    }
}
