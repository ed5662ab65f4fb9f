//! Stage executor backed by the Tabular Editor command line.
//!
//! Each stage runs the tool once against the model with the stage's
//! `.csx` script and `-E`, which makes the tool exit non-zero when the
//! script reports an error. The batch name reaches the script through the
//! child's `batchName` environment variable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::executor::{CommandInput, StageError, StageExecutor};
use super::subprocess;
use crate::redact::{Credentials, Redactor};
use crate::stage::{StageRequest, StageResult};

/// Environment variable the scripts read the batch name from.
pub const BATCH_NAME_ENV: &str = "batchName";

/// Default tool location, relative to the service's working directory.
pub const DEFAULT_EXECUTABLE: &str = "../TabularEditor/TabularEditor.exe";

/// Default directory holding the stage scripts.
pub const DEFAULT_SCRIPTS_DIR: &str = "../TabularEditor/Scripts";

/// Where the tool and its scripts live and how long a stage may run.
#[derive(Debug, Clone)]
pub struct TabularEditorConfig {
    pub executable: PathBuf,
    pub scripts_dir: PathBuf,
    /// `None` leaves stage duration unbounded.
    pub timeout: Option<Duration>,
}

impl Default for TabularEditorConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            scripts_dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            timeout: None,
        }
    }
}

/// Runs pipeline stages by spawning Tabular Editor.
pub struct TabularEditorExecutor {
    config: TabularEditorConfig,
    credentials: Credentials,
    redactor: Redactor,
}

impl TabularEditorExecutor {
    pub fn new(config: TabularEditorConfig, credentials: Credentials) -> Self {
        let redactor = credentials.redactor();
        Self {
            config,
            credentials,
            redactor,
        }
    }

    pub fn script_path(&self, request: &StageRequest) -> PathBuf {
        self.config.scripts_dir.join(request.script())
    }

    /// MSOLAP connection string for the request's target.
    pub fn connection_string(&self, request: &StageRequest) -> String {
        format!(
            "Provider=MSOLAP;Data Source={};User ID={};Password={}",
            request.descriptor.data_source(),
            self.credentials.user_id(),
            self.credentials.client_secret,
        )
    }

    /// Tool arguments: `<connection> <model> -S <script> -E`.
    pub fn arguments(&self, request: &StageRequest) -> Vec<String> {
        self.arguments_with_script(request, &self.script_path(request))
    }

    fn arguments_with_script(&self, request: &StageRequest, script: &Path) -> Vec<String> {
        vec![
            self.connection_string(request),
            request.descriptor.model.clone(),
            "-S".to_string(),
            script.to_string_lossy().into_owned(),
            "-E".to_string(),
        ]
    }

    fn command_input(
        &self,
        request: &StageRequest,
        executable: &Path,
        script: &Path,
    ) -> CommandInput {
        CommandInput {
            args: self.arguments_with_script(request, script),
            env_vars: vec![(BATCH_NAME_ENV.to_string(), request.batch_name().to_string())],
            working_directory: working_directory(executable),
            timeout: self.config.timeout,
        }
    }
}

#[async_trait]
impl StageExecutor for TabularEditorExecutor {
    async fn execute(&self, request: &StageRequest) -> Result<StageResult, StageError> {
        // The child runs from the tool's directory, so relative paths must
        // be resolved against ours first.
        let executable = absolute(&self.config.executable);
        if tokio::fs::metadata(&executable).await.is_err() {
            return Err(StageError::NotFound(executable.display().to_string()));
        }

        let script = absolute(&self.script_path(request));
        if tokio::fs::metadata(&script).await.is_err() {
            return Err(StageError::NotFound(script.display().to_string()));
        }

        let input = self.command_input(request, &executable, &script);
        let mut cmd = tokio::process::Command::new(&executable);
        let output = subprocess::run_command(&mut cmd, input).await?;

        let success = output.exit_code == 0;
        let text = self.redactor.redact(&format_output(
            output.exit_code,
            &output.stdout,
            &output.stderr,
        ));

        tracing::info!(
            stage = %request.stage,
            server = %request.descriptor.server,
            model = %request.descriptor.model,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "Tabular Editor finished",
        );
        tracing::debug!(stage = %request.stage, output = %text, "Tabular Editor output");

        Ok(if success {
            StageResult::succeeded(request.stage, text)
        } else {
            StageResult::failed(request.stage, text, output.exit_code)
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Run the tool from its own directory so relative resources resolve.
fn working_directory(executable: &Path) -> Option<String> {
    executable
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
}

/// Human-readable stage report: timestamp, exit code, captured output.
fn format_output(exit_code: i32, stdout: &str, stderr: &str) -> String {
    let verdict = if exit_code == 0 { "Success" } else { "Failed" };
    let mut text = format!(
        "TabularEditor.exe {}: \n ExitCode: {exit_code} ({verdict})\n Output:\n {stdout}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if !stderr.trim().is_empty() {
        text.push_str("\n Errors:\n ");
        text.push_str(stderr);
    }
    text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
