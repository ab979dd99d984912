//! Depot Grader - batch correction of student depots
//!
//! Provides a correction pipeline that, for every depot in a list:
//! - Clones the depot (optionally rewound to a point in time)
//! - Verifies the protected test harness was not modified
//! - Compiles the submission and runs the resulting binary
//! - Reports one outcome line per depot, never aborting the batch

pub mod build;
pub mod config;
pub mod depot;
pub mod error;
pub mod fakes;
pub mod fetch;
pub mod harness;
pub mod outcome;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod run;
pub mod telemetry;

// Re-export key types
pub use build::{Builder, GccBuilder};
pub use config::{GraderConfig, StageTimeouts, Timestamp, TIMESTAMP_FORMAT};
pub use depot::{parse_depot_list, read_depot_list, DepotId};
pub use error::{ConfigError, Result, StageError};
pub use fetch::{GitFetcher, RepositoryFetcher};
pub use harness::{
    hash_test_code, HarnessDigest, EMPTY_DIGEST, HARNESS_MARKER, REFERENCE_DIGEST,
};
pub use outcome::{FailureReason, OutcomeRecord, Status};
pub use pipeline::{CorrectionPipeline, Stage};
pub use process::{CommandOutput, ProcessError};
pub use report::OutputFormat;
pub use run::{decode_exit_status, ProcessRunner, Runner};
pub use telemetry::init_tracing;
