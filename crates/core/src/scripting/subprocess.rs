//! Shared subprocess management.
//!
//! [`run_command`] spawns a prepared [`Command`], captures stdout/stderr and
//! enforces the optional timeout. Callers set the program; arguments,
//! environment, and working directory come from [`CommandInput`].

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::executor::{CommandInput, CommandOutput, StageError};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Spawn `cmd` as a child process, capture its output, and wait for it.
///
/// Environment variables are applied to the child only; the parent process
/// environment is never touched, so concurrent stages cannot observe each
/// other's parameters.
pub async fn run_command(
    cmd: &mut Command,
    input: CommandInput,
) -> Result<CommandOutput, StageError> {
    // `kill_on_drop(true)` ensures the child is killed when dropped (e.g. on timeout).
    cmd.args(&input.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &input.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &input.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            StageError::NotFound(cmd.as_std().get_program().to_string_lossy().into_owned())
        }
        _ => StageError::Io(e),
    })?;

    // Read both pipes in spawned tasks so `child.wait()` can borrow `child`
    // without a full pipe stalling the process.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = match input.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(result) => result.map_err(StageError::Io)?,
            Err(_elapsed) => {
                // `child` is dropped on return, which kills the process.
                return Err(StageError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        },
        None => child.wait().await.map_err(StageError::Io)?,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms,
    })
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
