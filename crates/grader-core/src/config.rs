//! Run configuration, built once at startup and handed to the pipeline.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::depot::DepotId;
use crate::error::ConfigError;
use crate::harness::{HARNESS_MARKER, REFERENCE_DIGEST};

/// Accepted `--timestamp` format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Point in time at which depots are inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parse a `YYYY-MM-DD HH:MM` timestamp.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT)
            .map(Self)
            .map_err(|source| ConfigError::BadTimestamp {
                input: input.to_string(),
                source,
            })
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Date string for `git rev-list --before`.
    ///
    /// `--before` keeps commits dated exactly at its argument, so the date is
    /// one second earlier: a commit made at the timestamp itself is late.
    pub fn to_git_date(&self) -> String {
        let last_on_time = self.0 - chrono::Duration::seconds(1);
        last_on_time.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl std::str::FromStr for Timestamp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Per-stage time limits. `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub clone: Option<Duration>,
    pub checkout: Option<Duration>,
    pub compile: Option<Duration>,
    pub run: Option<Duration>,
}

impl StageTimeouts {
    /// Convert a seconds value where 0 means "no limit".
    pub fn from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    /// No limit on any stage.
    pub fn unlimited() -> Self {
        Self {
            clone: None,
            checkout: None,
            compile: None,
            run: None,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            clone: Some(Duration::from_secs(120)),
            checkout: Some(Duration::from_secs(60)),
            compile: Some(Duration::from_secs(60)),
            run: Some(Duration::from_secs(10)),
        }
    }
}

/// Immutable configuration for one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct GraderConfig {
    /// Inspect depots as of this time instead of HEAD.
    pub timestamp: Option<Timestamp>,

    /// Print each depot's commit log after it ran.
    pub show_log: bool,

    /// Host serving the depots over ssh.
    pub host: String,

    /// Full remote base overriding `host`, e.g. `file:///srv/depots`.
    pub remote_base: Option<String>,

    /// Directory receiving the clones.
    pub work_dir: PathBuf,

    /// Line of history searched when a timestamp is set.
    pub branch: String,

    /// Submitted source file, relative to the clone.
    pub source_file: String,

    /// Compiled executable, relative to the clone.
    pub artifact_file: String,

    /// C compiler program.
    pub compiler: String,

    /// Line opening the protected harness.
    pub marker: String,

    /// Digest of the unmodified harness.
    pub reference_digest: String,

    /// Remove a leftover clone directory before cloning.
    pub replace_existing: bool,

    pub timeouts: StageTimeouts,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            timestamp: None,
            show_log: false,
            host: "github.com".to_string(),
            remote_base: None,
            work_dir: PathBuf::from("."),
            branch: "HEAD".to_string(),
            source_file: "main.c".to_string(),
            artifact_file: "a.out".to_string(),
            compiler: "gcc".to_string(),
            marker: HARNESS_MARKER.to_string(),
            reference_digest: REFERENCE_DIGEST.to_string(),
            replace_existing: false,
            timeouts: StageTimeouts::default(),
        }
    }
}

impl GraderConfig {
    pub fn with_timestamp(mut self, timestamp: Option<Timestamp>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_show_log(mut self, show_log: bool) -> Self {
        self.show_log = show_log;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_remote_base(mut self, remote_base: impl Into<String>) -> Self {
        self.remote_base = Some(remote_base.into());
        self
    }

    pub fn with_reference_digest(mut self, digest: impl Into<String>) -> Self {
        self.reference_digest = digest.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Base URL that depot identifiers are appended to.
    pub fn remote_base(&self) -> String {
        match &self.remote_base {
            Some(base) => base.clone(),
            None => format!("ssh://git@{}", self.host),
        }
    }

    /// Local clone directory for a depot.
    pub fn depot_dir(&self, depot: &DepotId) -> PathBuf {
        self.work_dir.join(depot.local_name())
    }
}
