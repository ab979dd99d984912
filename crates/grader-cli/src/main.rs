//! Depot Grader CLI
//!
//! The `grader` command corrects every depot listed in a depot file:
//! clone, verify the test harness, compile `main.c`, run it, and print
//! one line per depot:
//!
//! - `<path> <code>`: the program's exit code
//! - `<path> ! <code>`: same, but the test harness was modified
//! - `<path>-1`: the depot could not be cloned (or checked out)
//! - `<path> -2`, `<path> -3`, `<path> -4`: source missing, compile failed,
//!   run failed or timed out

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use grader_core::{
    read_depot_list, CorrectionPipeline, GraderConfig, OutputFormat, StageTimeouts, Timestamp,
    REFERENCE_DIGEST,
};
use tracing::{error, info, Level};

/// Exit code for a malformed `--timestamp`.
const BAD_TIMESTAMP_EXIT: u8 = 100;

#[derive(Parser)]
#[command(name = "grader")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch-correct student depots", long_about = None)]
struct Cli {
    /// Date and time at which to inspect the depots (YYYY-MM-DD HH:MM)
    #[arg(short, long, env = "GRADER_TIMESTAMP", value_name = "TIMESTAMP")]
    timestamp: Option<String>,

    /// Print the git log of each depot that ran
    #[arg(short = 'l', long)]
    show_log: bool,

    /// File listing one owner/name depot per line
    #[arg(short, long, env = "GRADER_DEPOTS", default_value = "depots.txt")]
    depots: PathBuf,

    /// Host serving the depots over ssh
    #[arg(long, env = "GRADER_HOST", default_value = "github.com")]
    host: String,

    /// Remote base URL overriding --host (e.g. file:///srv/depots)
    #[arg(long, env = "GRADER_REMOTE_BASE")]
    remote_base: Option<String>,

    /// Directory receiving the clones
    #[arg(long, env = "GRADER_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// History searched when --timestamp is given
    #[arg(long, env = "GRADER_BRANCH", default_value = "HEAD")]
    branch: String,

    /// C compiler
    #[arg(long, env = "GRADER_COMPILER", default_value = "gcc")]
    compiler: String,

    /// SHA-256 of the unmodified test harness
    #[arg(long, env = "GRADER_REFERENCE_DIGEST", default_value = REFERENCE_DIGEST)]
    reference_digest: String,

    /// Remove an existing clone directory before cloning
    #[arg(long)]
    force: bool,

    /// Clone time limit in seconds (0 = none)
    #[arg(long, env = "GRADER_CLONE_TIMEOUT", default_value_t = 120)]
    clone_timeout: u64,

    /// Checkout time limit in seconds (0 = none)
    #[arg(long, env = "GRADER_CHECKOUT_TIMEOUT", default_value_t = 60)]
    checkout_timeout: u64,

    /// Compile time limit in seconds (0 = none)
    #[arg(long, env = "GRADER_COMPILE_TIMEOUT", default_value_t = 60)]
    compile_timeout: u64,

    /// Run time limit in seconds (0 = none)
    #[arg(long, env = "GRADER_RUN_TIMEOUT", default_value_t = 10)]
    run_timeout: u64,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

impl Cli {
    fn config(&self, timestamp: Option<Timestamp>) -> GraderConfig {
        GraderConfig {
            timestamp,
            show_log: self.show_log,
            host: self.host.clone(),
            remote_base: self.remote_base.clone(),
            work_dir: self.work_dir.clone(),
            branch: self.branch.clone(),
            compiler: self.compiler.clone(),
            reference_digest: self.reference_digest.to_lowercase(),
            replace_existing: self.force,
            timeouts: StageTimeouts {
                clone: StageTimeouts::from_secs(self.clone_timeout),
                checkout: StageTimeouts::from_secs(self.checkout_timeout),
                compile: StageTimeouts::from_secs(self.compile_timeout),
                run: StageTimeouts::from_secs(self.run_timeout),
            },
            ..GraderConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Validate the timestamp before anything touches the network
    let timestamp = match cli.timestamp.as_deref().map(Timestamp::parse).transpose() {
        Ok(timestamp) => timestamp,
        Err(err) => {
            eprintln!("Bad timestamp: {err}");
            return ExitCode::from(BAD_TIMESTAMP_EXIT);
        }
    };

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    grader_core::init_tracing(cli.json, level);

    match run(&cli, timestamp).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Correction aborted");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, timestamp: Option<Timestamp>) -> Result<()> {
    let depots = read_depot_list(&cli.depots).context("Failed to load depot list")?;
    let config = cli.config(timestamp);
    info!(
        depots = depots.len(),
        remote = %config.remote_base(),
        timestamp = ?config.timestamp.map(|t| t.to_string()),
        "Loaded depot list"
    );

    let pipeline = CorrectionPipeline::from_config(config);
    let mut stdout = std::io::stdout().lock();
    pipeline
        .run_batch(&depots, cli.format.into(), &mut stdout)
        .await
        .context("Failed to write report")?;
    Ok(())
}
