//! Stage execution through the external Tabular Editor tool.
//!
//! [`executor`] defines the [`StageExecutor`](executor::StageExecutor)
//! contract the orchestrator consumes. [`subprocess`] holds the shared
//! spawn/capture/timeout logic and [`tabular_editor`] builds the concrete
//! command line for each stage.

pub mod executor;
pub mod subprocess;
pub mod tabular_editor;

/// Shared test helpers for executor tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Write an executable shell script named `name` into `dir`.
    ///
    /// The file handle is closed before returning so the script can be
    /// exec'd directly.
    pub fn write_executable(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }
}
