//! Subprocess execution with an optional time limit.
//!
//! Commands are always argument vectors; nothing goes through a shell.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Bytes kept from each of stdout and stderr by [`execute`].
pub const OUTPUT_CAPTURE_LIMIT: u64 = 1024 * 1024;

/// Errors from launching or waiting on a subprocess.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {} seconds", .limit.as_secs_f64())]
    TimedOut { program: String, limit: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Raw termination status.
    pub status: ExitStatus,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `command` to completion, capturing stdout and stderr.
///
/// Stdin is `/dev/null`. When `timeout` elapses the child is killed and
/// `ProcessError::TimedOut` is returned.
pub async fn execute(
    command: Command,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ProcessError> {
    execute_capped(command, timeout, OUTPUT_CAPTURE_LIMIT).await
}

/// Like [`execute`], keeping at most `capture_limit` bytes of each output
/// stream.
///
/// The rest is read and discarded so the child never blocks on a full pipe.
pub async fn execute_capped(
    mut command: Command,
    timeout: Option<Duration>,
    capture_limit: u64,
) -> Result<CommandOutput, ProcessError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = read_capped(child.stdout.take(), capture_limit);
    let stderr = read_capped(child.stderr.take(), capture_limit);
    let collect = async { tokio::try_join!(child.wait(), stdout, stderr) };

    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, collect)
            .await
            .map_err(|_| ProcessError::TimedOut {
                program: program.clone(),
                limit,
            })?,
        None => collect.await,
    };
    let (status, stdout, stderr) = waited.map_err(|source| ProcessError::Wait {
        program: program.clone(),
        source,
    })?;

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(%program, %status, duration_ms, "Process finished");

    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        duration_ms,
    })
}

async fn read_capped<R: AsyncRead + Unpin>(
    stream: Option<R>,
    limit: u64,
) -> std::io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let Some(mut stream) = stream else {
        return Ok(kept);
    };
    (&mut stream).take(limit).read_to_end(&mut kept).await?;
    tokio::io::copy(&mut stream, &mut tokio::io::sink()).await?;
    Ok(kept)
}

/// Like [`execute`], but a non-zero exit is an error.
pub async fn execute_checked(
    command: Command,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ProcessError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let output = execute(command, timeout).await?;
    if !output.success() {
        return Err(ProcessError::Failed {
            program,
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}
