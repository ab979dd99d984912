//! Correction pipeline orchestration.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::build::{Builder, GccBuilder};
use crate::config::GraderConfig;
use crate::depot::DepotId;
use crate::error::{Result, StageError};
use crate::fetch::{GitFetcher, RepositoryFetcher};
use crate::harness::hash_test_code;
use crate::outcome::{OutcomeRecord, Status};
use crate::report::{write_record, OutputFormat};
use crate::run::{ProcessRunner, Runner};

/// States a depot moves through. `CheckedOut` only occurs with a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    Cloned,
    CheckedOut,
    Verified,
    Compiled,
    Ran,
    Reported,
}

/// Progress of a single depot, kept when a later stage fails.
#[derive(Debug, Clone, Copy)]
struct Progress {
    stage: Stage,
    harness_mismatch: bool,
}

impl Progress {
    fn new() -> Self {
        Self {
            stage: Stage::Start,
            harness_mismatch: false,
        }
    }

    fn advance(&mut self, depot: &DepotId, stage: Stage) {
        debug!(depot = %depot, from = ?self.stage, to = ?stage, "Stage transition");
        self.stage = stage;
    }
}

/// Drives every depot through clone, checkout, verify, compile and run.
pub struct CorrectionPipeline {
    config: GraderConfig,
    fetcher: Arc<dyn RepositoryFetcher>,
    builder: Arc<dyn Builder>,
    runner: Arc<dyn Runner>,
}

impl CorrectionPipeline {
    pub fn new(
        config: GraderConfig,
        fetcher: Arc<dyn RepositoryFetcher>,
        builder: Arc<dyn Builder>,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self {
            config,
            fetcher,
            builder,
            runner,
        }
    }

    /// Pipeline using git, the configured compiler and a child process runner.
    pub fn from_config(config: GraderConfig) -> Self {
        let timeouts = config.timeouts;
        let fetcher = GitFetcher::new(timeouts.clone, timeouts.checkout);
        let builder = GccBuilder::new(config.compiler.clone(), timeouts.compile);
        let runner = ProcessRunner::new(timeouts.run);
        Self::new(config, Arc::new(fetcher), Arc::new(builder), Arc::new(runner))
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// Correct one depot. Stage failures become a sentinel status.
    pub async fn correct(&self, depot: &DepotId) -> OutcomeRecord {
        let start = Instant::now();
        let mut progress = Progress::new();

        let status = match self.advance(depot, &mut progress).await {
            Ok(code) => Status::Exited(code),
            Err(err) => {
                warn!(
                    depot = %depot,
                    stage = ?progress.stage,
                    reason = err.reason().name(),
                    error = %err,
                    "Correction stage failed"
                );
                Status::Failed(err.reason())
            }
        };
        progress.advance(depot, Stage::Reported);

        let record = OutcomeRecord::new(depot.clone(), progress.harness_mismatch, status);
        info!(
            depot = %depot,
            status = status.code(),
            harness_mismatch = progress.harness_mismatch,
            duration_ms = start.elapsed().as_millis() as u64,
            "Depot corrected"
        );
        record
    }

    async fn advance(&self, depot: &DepotId, progress: &mut Progress) -> Result<u8> {
        if !depot.is_valid() {
            return Err(StageError::InvalidDepot(depot.to_string()));
        }

        let dir = self.config.depot_dir(depot);
        let url = depot.remote_url(&self.config.remote_base());

        if self.config.replace_existing && dir.exists() {
            info!(dir = %dir.display(), "Removing previous clone");
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| StageError::Clone {
                    url: url.clone(),
                    reason: format!("cannot remove {}: {e}", dir.display()),
                })?;
        }

        self.fetcher.clone_depot(&url, &dir).await?;
        progress.advance(depot, Stage::Cloned);

        if let Some(timestamp) = &self.config.timestamp {
            self.fetcher
                .checkout_before(&dir, timestamp, &self.config.branch)
                .await?;
            progress.advance(depot, Stage::CheckedOut);
        }

        let source = dir.join(&self.config.source_file);
        let digest = hash_test_code(&source, &self.config.marker)?;
        progress.harness_mismatch = !digest.matches(&self.config.reference_digest);
        if progress.harness_mismatch {
            warn!(
                depot = %depot,
                observed = %digest,
                no_marker = digest.is_empty_input(),
                "Test harness differs from reference"
            );
        }
        progress.advance(depot, Stage::Verified);

        let artifact = dir.join(&self.config.artifact_file);
        self.builder.build(&source, &artifact).await?;
        progress.advance(depot, Stage::Compiled);

        let code = self.runner.run(&artifact).await?;
        progress.advance(depot, Stage::Ran);

        Ok(code)
    }

    /// Correct `depots` in order, writing each record as soon as it is known.
    ///
    /// With `show_log`, the commit log of every depot that ran follows its
    /// record line.
    pub async fn run_batch<W: Write>(
        &self,
        depots: &[DepotId],
        format: OutputFormat,
        out: &mut W,
    ) -> io::Result<Vec<OutcomeRecord>> {
        info!(depots = depots.len(), "Starting correction batch");

        let mut records = Vec::with_capacity(depots.len());
        for depot in depots {
            let record = self.correct(depot).await;
            write_record(out, &record, format)?;

            if self.config.show_log && record.ran() {
                match self.fetcher.log(&self.config.depot_dir(depot)).await {
                    Ok(log) => {
                        out.write_all(log.as_bytes())?;
                        out.flush()?;
                    }
                    Err(err) => warn!(depot = %depot, error = %err, "Failed to show log"),
                }
            }
            records.push(record);
        }

        let ran = records.iter().filter(|r| r.ran()).count();
        info!(total = records.len(), ran, "Correction batch finished");
        Ok(records)
    }
}
