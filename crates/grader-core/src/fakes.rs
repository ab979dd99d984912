//! In-memory fakes for the stage traits (testing only)
//!
//! Provides `FakeFetcher`, `FakeBuilder` and `FakeRunner`, which satisfy the
//! trait contracts without network access, a compiler or child processes.
//! Each fake is cheaply cloneable and shares its call log between clones, so
//! a test can keep a handle after moving one into the pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::build::Builder;
use crate::config::Timestamp;
use crate::error::{Result, StageError};
use crate::fetch::RepositoryFetcher;
use crate::process::ProcessError;
use crate::run::Runner;

/// A small submission with an intact harness.
pub const SAMPLE_SOURCE: &str = "\
#include <assert.h>

int add(int a, int b)
{
    return a + b;
}

int main()
{
    assert(add(2, 3) == 5);
    return 0;
}
";

/// Harness section of [`SAMPLE_SOURCE`].
pub const SAMPLE_HARNESS: &str = "\
int main()
{
    assert(add(2, 3) == 5);
    return 0;
}
";

/// Digest of [`SAMPLE_HARNESS`], usable as a reference digest.
pub fn sample_reference_digest() -> String {
    hex::encode(Sha256::digest(SAMPLE_HARNESS.as_bytes()))
}

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Content of a fake remote depot.
#[derive(Debug, Clone)]
pub struct FakeDepot {
    files: Vec<(String, String)>,
    commit_before: Option<String>,
    log: String,
}

impl FakeDepot {
    /// Depot whose `main.c` holds `source`.
    pub fn with_source(source: &str) -> Self {
        Self {
            files: vec![("main.c".to_string(), source.to_string())],
            commit_before: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
            log: "* 0123456 (HEAD -> master, origin/master) Submit homework\n".to_string(),
        }
    }

    /// Depot with an intact sample submission.
    pub fn sample() -> Self {
        Self::with_source(SAMPLE_SOURCE)
    }

    /// Depot that lacks `main.c`.
    pub fn without_source() -> Self {
        Self {
            files: Vec::new(),
            ..Self::sample()
        }
    }

    /// Depot with no commit old enough for any timestamp.
    pub fn without_history(mut self) -> Self {
        self.commit_before = None;
        self
    }
}

#[derive(Debug, Default)]
struct FetcherState {
    clones: Vec<String>,
    checkouts: Vec<PathBuf>,
}

/// Fetcher that materialises registered depots on disk and fails all others.
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher {
    depots: HashMap<String, FakeDepot>,
    state: Arc<Mutex<FetcherState>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a depot reachable under `id` (`owner/name`).
    pub fn with_depot(mut self, id: &str, depot: FakeDepot) -> Self {
        self.depots.insert(id.to_string(), depot);
        self
    }

    /// URLs passed to `clone_depot`, in call order.
    pub fn cloned_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().clones.clone()
    }

    /// Number of `checkout_before` calls.
    pub fn checkout_count(&self) -> usize {
        self.state.lock().unwrap().checkouts.len()
    }

    fn lookup(&self, url: &str) -> Option<&FakeDepot> {
        self.depots
            .iter()
            .find(|(id, _)| url.ends_with(&format!("/{id}.git")))
            .map(|(_, depot)| depot)
    }

    fn lookup_dir(&self, dest: &Path) -> Option<&FakeDepot> {
        let name = dest.file_name()?.to_string_lossy().into_owned();
        self.depots
            .iter()
            .find(|(id, _)| id.replace('/', "-") == name)
            .map(|(_, depot)| depot)
    }
}

#[async_trait]
impl RepositoryFetcher for FakeFetcher {
    async fn clone_depot(&self, url: &str, dest: &Path) -> Result<()> {
        self.state.lock().unwrap().clones.push(url.to_string());

        let clone_err = |reason: String| StageError::Clone {
            url: url.to_string(),
            reason,
        };
        let depot = self
            .lookup(url)
            .ok_or_else(|| clone_err("repository not found".to_string()))?;

        std::fs::create_dir_all(dest).map_err(|e| clone_err(e.to_string()))?;
        for (name, content) in &depot.files {
            std::fs::write(dest.join(name), content).map_err(|e| clone_err(e.to_string()))?;
        }
        Ok(())
    }

    async fn checkout_before(
        &self,
        dest: &Path,
        timestamp: &Timestamp,
        branch: &str,
    ) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .checkouts
            .push(dest.to_path_buf());

        self.lookup_dir(dest)
            .and_then(|depot| depot.commit_before.clone())
            .ok_or_else(|| StageError::Checkout {
                timestamp: timestamp.to_string(),
                reason: format!("no commit on {branch} before {timestamp}"),
            })
    }

    async fn log(&self, dest: &Path) -> std::result::Result<String, ProcessError> {
        self.lookup_dir(dest)
            .map(|depot| depot.log.clone())
            .ok_or_else(|| ProcessError::Spawn {
                program: "git".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a clone"),
            })
    }
}

// ---------------------------------------------------------------------------
// FakeBuilder
// ---------------------------------------------------------------------------

/// Builder that succeeds or fails without compiling anything.
#[derive(Debug, Clone)]
pub struct FakeBuilder {
    succeed: bool,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeBuilder {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Builder for FakeBuilder {
    async fn build(&self, source: &Path, _artifact: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(source.to_path_buf());
        if self.succeed {
            Ok(())
        } else {
            Err(StageError::Compile {
                source_file: source.to_path_buf(),
                reason: "error: expected ';' before '}' token".to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// FakeRunner
// ---------------------------------------------------------------------------

/// Runner returning preset exit codes.
#[derive(Debug, Clone)]
pub struct FakeRunner {
    default_code: Option<u8>,
    codes: HashMap<String, u8>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeRunner {
    /// Every artifact exits with `code`.
    pub fn exiting(code: u8) -> Self {
        Self {
            default_code: Some(code),
            codes: HashMap::new(),
            calls: Arc::default(),
        }
    }

    /// Every artifact fails to run (e.g. times out).
    pub fn hanging() -> Self {
        Self {
            default_code: None,
            ..Self::exiting(0)
        }
    }

    /// Artifacts inside the clone directory `local_name` exit with `code`.
    pub fn with_code_for(mut self, local_name: &str, code: u8) -> Self {
        self.codes.insert(local_name.to_string(), code);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(&self, artifact: &Path) -> Result<u8> {
        self.calls.lock().unwrap().push(artifact.to_path_buf());

        let dir_name = artifact
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.codes
            .get(&dir_name)
            .copied()
            .or(self.default_code)
            .ok_or_else(|| StageError::Run {
                artifact: artifact.to_path_buf(),
                reason: "timed out".to_string(),
            })
    }
}
