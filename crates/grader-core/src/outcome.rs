//! Per-depot outcome records.

use serde::{Deserialize, Serialize};

use crate::depot::DepotId;

/// Pipeline stage whose failure ended a depot's correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Depot could not be cloned or checked out.
    Clone,

    /// Submitted source file missing or unreadable.
    Harness,

    /// Compiler failed.
    Compile,

    /// Artifact could not be launched or exceeded its time limit.
    Run,
}

impl FailureReason {
    /// Negative status reported for this failure.
    pub const fn sentinel(self) -> i32 {
        match self {
            FailureReason::Clone => -1,
            FailureReason::Harness => -2,
            FailureReason::Compile => -3,
            FailureReason::Run => -4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FailureReason::Clone => "clone",
            FailureReason::Harness => "harness",
            FailureReason::Compile => "compile",
            FailureReason::Run => "run",
        }
    }
}

/// Final status of a depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Submission ran; its decoded exit code.
    Exited(u8),

    /// A stage failed before the submission could run to completion.
    Failed(FailureReason),
}

impl Status {
    /// Integer status: the exit code, or a negative sentinel.
    pub fn code(&self) -> i32 {
        match self {
            Status::Exited(code) => i32::from(*code),
            Status::Failed(reason) => reason.sentinel(),
        }
    }
}

/// Immutable result of correcting one depot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    depot: DepotId,
    harness_mismatch: bool,
    status: Status,
}

impl OutcomeRecord {
    pub fn new(depot: DepotId, harness_mismatch: bool, status: Status) -> Self {
        Self {
            depot,
            harness_mismatch,
            status,
        }
    }

    pub fn depot(&self) -> &DepotId {
        &self.depot
    }

    /// Whether the observed harness digest differed from the reference.
    pub fn harness_mismatch(&self) -> bool {
        self.harness_mismatch
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the submission was executed.
    pub fn ran(&self) -> bool {
        matches!(self.status, Status::Exited(_))
    }

    /// Machine-readable form of the record.
    pub fn to_json(&self) -> serde_json::Value {
        let failure = match self.status {
            Status::Exited(_) => None,
            Status::Failed(reason) => Some(reason),
        };
        serde_json::json!({
            "depot": &self.depot,
            "path": self.depot.local_name(),
            "harness_mismatch": self.harness_mismatch,
            "status": self.status.code(),
            "failure": failure,
        })
    }
}

/// `<local-path>[ !][ <status>]`.
///
/// A clone failure is appended without the separating space, so the line
/// reads e.g. `bob-hw1-1`.
impl std::fmt::Display for OutcomeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.depot.local_name())?;
        if self.harness_mismatch {
            f.write_str(" !")?;
        }
        match self.status {
            Status::Failed(FailureReason::Clone) => write!(f, "{}", self.status.code()),
            status => write!(f, " {}", status.code()),
        }
    }
}
