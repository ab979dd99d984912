//! Compiling a submission.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, StageError};
use crate::process::execute_checked;

/// Turns one source file into an executable.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, source: &Path, artifact: &Path) -> Result<()>;
}

/// [`Builder`] invoking a C compiler as `<cc> <source> -lm -o <artifact>`.
#[derive(Debug, Clone)]
pub struct GccBuilder {
    compiler: String,
    timeout: Option<Duration>,
}

impl Default for GccBuilder {
    fn default() -> Self {
        Self::new("gcc", None)
    }
}

impl GccBuilder {
    pub fn new(compiler: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            compiler: compiler.into(),
            timeout,
        }
    }

    /// Argument vector passed to the compiler.
    pub fn args(source: &Path, artifact: &Path) -> Vec<std::ffi::OsString> {
        vec![
            source.as_os_str().to_os_string(),
            "-lm".into(),
            "-o".into(),
            artifact.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl Builder for GccBuilder {
    async fn build(&self, source: &Path, artifact: &Path) -> Result<()> {
        info!(compiler = %self.compiler, source = %source.display(), "Compiling submission");

        let mut command = Command::new(&self.compiler);
        command.args(Self::args(source, artifact));

        let output = execute_checked(command, self.timeout)
            .await
            .map_err(|e| StageError::Compile {
                source_file: source.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !output.stderr.is_empty() {
            debug!(stderr = %output.stderr, "Compiler diagnostics");
        }
        Ok(())
    }
}
