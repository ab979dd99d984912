//! Error taxonomy for the grader.
//!
//! `ConfigError` is fatal to the whole batch and is raised before any depot
//! is touched. `StageError` is fatal to one depot only; the pipeline turns it
//! into a sentinel status at the reporting boundary.

use std::path::PathBuf;

use crate::outcome::FailureReason;

/// Errors raised while building the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bad timestamp {input:?}: expected YYYY-MM-DD HH:MM ({source})")]
    BadTimestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid depot identifier {0:?}: expected owner/name")]
    InvalidDepot(String),

    #[error("failed to read depot list {path}: {source}")]
    DepotList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of one pipeline stage for one depot.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid depot identifier {0:?}: expected owner/name")]
    InvalidDepot(String),

    #[error("clone of {url} failed: {reason}")]
    Clone { url: String, reason: String },

    #[error("checkout before {timestamp} failed: {reason}")]
    Checkout { timestamp: String, reason: String },

    #[error("cannot read harness file {path}: {source}")]
    Harness {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation of {source_file} failed: {reason}")]
    Compile { source_file: PathBuf, reason: String },

    #[error("execution of {artifact} failed: {reason}")]
    Run { artifact: PathBuf, reason: String },
}

impl StageError {
    /// Failure reason reported for this error.
    ///
    /// A malformed identifier or a failed time-travel checkout is reported
    /// like a failed clone: the depot could not be retrieved as requested.
    pub fn reason(&self) -> FailureReason {
        match self {
            StageError::InvalidDepot(_)
            | StageError::Clone { .. }
            | StageError::Checkout { .. } => FailureReason::Clone,
            StageError::Harness { .. } => FailureReason::Harness,
            StageError::Compile { .. } => FailureReason::Compile,
            StageError::Run { .. } => FailureReason::Run,
        }
    }
}

/// Result type for pipeline stages.
pub type Result<T> = std::result::Result<T, StageError>;
