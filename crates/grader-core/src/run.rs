//! Running a compiled submission.

use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, StageError};
use crate::process::execute_capped;

/// Bytes of each submission output stream kept for the debug log.
pub const RUN_OUTPUT_LIMIT: u64 = 64 * 1024;

/// Executes a build artifact and returns its decoded exit code.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, artifact: &Path) -> Result<u8>;
}

/// [`Runner`] launching the artifact as a child process with no arguments.
///
/// Output beyond [`RUN_OUTPUT_LIMIT`] per stream is drained and dropped.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, artifact: &Path) -> Result<u8> {
        info!(artifact = %artifact.display(), "Running submission");

        let output = execute_capped(Command::new(artifact), self.timeout, RUN_OUTPUT_LIMIT)
            .await
            .map_err(|e| StageError::Run {
                artifact: artifact.to_path_buf(),
                reason: e.to_string(),
            })?;

        let code = decode_exit_status(&output.status);
        debug!(
            code,
            stdout = %output.stdout,
            stderr = %output.stderr,
            duration_ms = output.duration_ms,
            "Submission finished"
        );
        Ok(code)
    }
}

/// Normalise a termination status to `[0, 255]`.
///
/// A normal exit yields the low byte of the exit code. Death by signal `n`
/// yields `128 + n`, as shells report it. Anything else yields 255.
pub fn decode_exit_status(status: &ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return (code & 0xff) as u8;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (128 + signal).clamp(0, 255) as u8;
        }
    }

    u8::MAX
}
