//! Retrieving depots with git.
//!
//! Authentication is left to git and the invoking user's ssh agent.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Timestamp;
use crate::error::{Result, StageError};
use crate::process::{execute_checked, ProcessError};

/// Source-control operations the pipeline needs.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Clone `url` into `dest`.
    async fn clone_depot(&self, url: &str, dest: &Path) -> Result<()>;

    /// Check out the newest commit on `branch` older than `timestamp`.
    ///
    /// Returns the commit that was checked out.
    async fn checkout_before(
        &self,
        dest: &Path,
        timestamp: &Timestamp,
        branch: &str,
    ) -> Result<String>;

    /// Compact decorated commit graph of the clone.
    async fn log(&self, dest: &Path) -> std::result::Result<String, ProcessError>;
}

/// [`RepositoryFetcher`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    clone_timeout: Option<Duration>,
    checkout_timeout: Option<Duration>,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl GitFetcher {
    pub fn new(clone_timeout: Option<Duration>, checkout_timeout: Option<Duration>) -> Self {
        Self {
            program: "git".to_string(),
            clone_timeout,
            checkout_timeout,
        }
    }

    /// `git` command, never prompting for credentials.
    fn git(&self, repo_dir: Option<&Path>) -> Command {
        let mut command = Command::new(&self.program);
        command.env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = repo_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn clone_depot(&self, url: &str, dest: &Path) -> Result<()> {
        info!(%url, dest = %dest.display(), "Cloning depot");

        let mut command = self.git(None);
        command.args(["clone", "--quiet", "--"]).arg(url).arg(dest);

        execute_checked(command, self.clone_timeout)
            .await
            .map_err(|e| StageError::Clone {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn checkout_before(
        &self,
        dest: &Path,
        timestamp: &Timestamp,
        branch: &str,
    ) -> Result<String> {
        let checkout_err = |reason: String| StageError::Checkout {
            timestamp: timestamp.to_string(),
            reason,
        };

        let mut rev_list = self.git(Some(dest));
        rev_list
            .args(["rev-list", "-n", "1", "--first-parent"])
            .arg(format!("--before={}", timestamp.to_git_date()))
            .arg(branch)
            .arg("--");
        let output = execute_checked(rev_list, self.checkout_timeout)
            .await
            .map_err(|e| checkout_err(e.to_string()))?;

        let sha = output.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(checkout_err(format!("no commit on {branch} before {timestamp}")));
        }
        debug!(%sha, %timestamp, "Resolved commit before timestamp");

        let mut checkout = self.git(Some(dest));
        checkout.args(["checkout", "--quiet"]).arg(&sha);
        execute_checked(checkout, self.checkout_timeout)
            .await
            .map_err(|e| checkout_err(e.to_string()))?;

        info!(%sha, dest = %dest.display(), "Checked out depot at timestamp");
        Ok(sha)
    }

    async fn log(&self, dest: &Path) -> std::result::Result<String, ProcessError> {
        let mut command = self.git(Some(dest));
        command.args(["log", "--oneline", "--graph", "--decorate", "--no-color"]);
        let output = execute_checked(command, self.checkout_timeout).await?;
        Ok(output.stdout)
    }
}
