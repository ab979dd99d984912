//! Integration tests for the correction pipeline with in-memory fakes.

use std::sync::Arc;

use grader_core::fakes::{
    sample_reference_digest, FakeBuilder, FakeDepot, FakeFetcher, FakeRunner, SAMPLE_SOURCE,
};
use grader_core::{
    parse_depot_list, CorrectionPipeline, DepotId, FailureReason, GraderConfig, OutputFormat,
    Status, Timestamp,
};

fn config(dir: &std::path::Path) -> GraderConfig {
    GraderConfig::default()
        .with_work_dir(dir)
        .with_reference_digest(sample_reference_digest())
}

fn pipeline(
    config: GraderConfig,
    fetcher: &FakeFetcher,
    builder: &FakeBuilder,
    runner: &FakeRunner,
) -> CorrectionPipeline {
    CorrectionPipeline::new(
        config,
        Arc::new(fetcher.clone()),
        Arc::new(builder.clone()),
        Arc::new(runner.clone()),
    )
}

fn depot(id: &str) -> DepotId {
    DepotId::parse(id).expect("valid depot")
}

/// Test: comment line skipped, alice passes, bob fails to clone
#[tokio::test]
async fn test_alice_and_bob_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new().with_depot("alice/hw1", FakeDepot::sample());
    let builder = FakeBuilder::succeeding();
    let runner = FakeRunner::exiting(0);
    let p = pipeline(config(dir.path()), &fetcher, &builder, &runner);

    let depots = parse_depot_list("# comment\nalice/hw1\nbob/hw1\n");
    let mut out = Vec::new();
    let records = p
        .run_batch(&depots, OutputFormat::Text, &mut out)
        .await
        .expect("batch failed");

    assert_eq!(records.len(), 2, "One record per depot, none for the comment");
    assert_eq!(records[0].depot().as_str(), "alice/hw1");
    assert_eq!(records[0].status(), Status::Exited(0));
    assert!(!records[0].harness_mismatch());
    assert_eq!(records[1].depot().as_str(), "bob/hw1");
    assert_eq!(records[1].status().code(), -1);

    let output = String::from_utf8(out).expect("utf8");
    assert_eq!(output, "alice-hw1 0\nbob-hw1-1\n");

    assert_eq!(fetcher.cloned_urls().len(), 2, "No clone for the comment line");
    assert_eq!(builder.calls(), 1, "bob never reaches the compiler");
    assert_eq!(runner.calls(), 1);
}

/// Test: a comment-only list produces nothing
#[tokio::test]
async fn test_comment_lines_produce_no_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new();
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let depots = parse_depot_list("# alice/hw1\n#bob/hw1\n");
    let mut out = Vec::new();
    let records = p
        .run_batch(&depots, OutputFormat::Text, &mut out)
        .await
        .expect("batch failed");

    assert!(records.is_empty());
    assert!(out.is_empty());
    assert!(fetcher.cloned_urls().is_empty());
}

/// Test: a malformed entry is reported as -1 in place, without cloning
#[tokio::test]
async fn test_malformed_entry_reported_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new().with_depot("bob/hw1", FakeDepot::sample());
    let builder = FakeBuilder::succeeding();
    let mut config = config(dir.path());
    config.replace_existing = true;
    let p = pipeline(
        config,
        &fetcher,
        &builder,
        &FakeRunner::exiting(0),
    );

    let depots = parse_depot_list("alice/hw1/extra\nbob/hw1\n../hw1\n");
    let mut out = Vec::new();
    let records = p
        .run_batch(&depots, OutputFormat::Text, &mut out)
        .await
        .expect("batch failed");

    assert_eq!(records.len(), 3, "One record per listed depot");
    assert_eq!(records[0].status(), Status::Failed(FailureReason::Clone));
    assert_eq!(records[1].status(), Status::Exited(0));
    assert_eq!(records[2].status(), Status::Failed(FailureReason::Clone));

    let output = String::from_utf8(out).expect("utf8");
    assert_eq!(output, "alice-hw1-extra-1\nbob-hw1 0\n..-hw1-1\n");
    assert_eq!(fetcher.cloned_urls().len(), 1, "Only bob/hw1 is cloned");
    assert_eq!(builder.calls(), 1);
}

/// Test: clone failure stops the depot before any other stage
#[tokio::test]
async fn test_clone_failure_skips_later_stages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new();
    let builder = FakeBuilder::succeeding();
    let runner = FakeRunner::exiting(0);
    let p = pipeline(
        config(dir.path()).with_timestamp(Some(Timestamp::parse("2024-05-01 12:00").unwrap())),
        &fetcher,
        &builder,
        &runner,
    );

    let record = p.correct(&depot("bob/hw1")).await;
    assert_eq!(record.status(), Status::Failed(FailureReason::Clone));
    assert_eq!(record.status().code(), -1);
    assert!(!record.harness_mismatch());
    assert_eq!(fetcher.checkout_count(), 0);
    assert_eq!(builder.calls(), 0);
    assert_eq!(runner.calls(), 0);
}

/// Test: compile failure reports -3 and never runs
#[tokio::test]
async fn test_compile_failure_never_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new().with_depot("carol/hw1", FakeDepot::sample());
    let builder = FakeBuilder::failing();
    let runner = FakeRunner::exiting(0);
    let p = pipeline(config(dir.path()), &fetcher, &builder, &runner);

    let record = p.correct(&depot("carol/hw1")).await;
    assert_eq!(record.status().code(), -3);
    assert_eq!(builder.calls(), 1);
    assert_eq!(runner.calls(), 0);
    assert_eq!(record.to_string(), "carol-hw1 -3");
}

/// Test: program exit codes pass through unchanged
#[tokio::test]
async fn test_exit_codes_pass_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new()
        .with_depot("alice/hw1", FakeDepot::sample())
        .with_depot("dave/hw1", FakeDepot::sample())
        .with_depot("erin/hw1", FakeDepot::sample());
    let runner = FakeRunner::exiting(0)
        .with_code_for("dave-hw1", 1)
        .with_code_for("erin-hw1", 255);
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &runner,
    );

    let depots = vec![depot("alice/hw1"), depot("dave/hw1"), depot("erin/hw1")];
    let mut out = Vec::new();
    let records = p
        .run_batch(&depots, OutputFormat::Text, &mut out)
        .await
        .expect("batch failed");

    let codes: Vec<i32> = records.iter().map(|r| r.status().code()).collect();
    assert_eq!(codes, vec![0, 1, 255]);
}

/// Test: a tampered harness is flagged but still compiled and run
#[tokio::test]
async fn test_harness_mismatch_is_informational() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tampered = SAMPLE_SOURCE.replace("== 5", "== 5 || 1");
    let fetcher = FakeFetcher::new().with_depot("mallory/hw1", FakeDepot::with_source(&tampered));
    let builder = FakeBuilder::succeeding();
    let runner = FakeRunner::exiting(0);
    let p = pipeline(config(dir.path()), &fetcher, &builder, &runner);

    let record = p.correct(&depot("mallory/hw1")).await;
    assert!(record.harness_mismatch());
    assert_eq!(record.status(), Status::Exited(0));
    assert_eq!(builder.calls(), 1);
    assert_eq!(runner.calls(), 1);
    assert_eq!(record.to_string(), "mallory-hw1 ! 0");
}

/// Test: editing code above the harness does not raise the flag
#[tokio::test]
async fn test_prefix_edits_are_not_flagged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let edited = SAMPLE_SOURCE.replace("return a + b;", "int sum = a + b;\n    return sum;");
    let fetcher = FakeFetcher::new().with_depot("alice/hw1", FakeDepot::with_source(&edited));
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let record = p.correct(&depot("alice/hw1")).await;
    assert!(!record.harness_mismatch());
}

/// Test: a missing source file is a per-depot failure, batch continues
#[tokio::test]
async fn test_missing_source_is_isolated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new()
        .with_depot("alice/hw1", FakeDepot::without_source())
        .with_depot("bob/hw1", FakeDepot::sample());
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let depots = vec![depot("alice/hw1"), depot("bob/hw1")];
    let mut out = Vec::new();
    let records = p
        .run_batch(&depots, OutputFormat::Text, &mut out)
        .await
        .expect("batch failed");

    assert_eq!(records[0].status(), Status::Failed(FailureReason::Harness));
    assert_eq!(records[0].to_string(), "alice-hw1 -2");
    assert_eq!(records[1].status(), Status::Exited(0));
}

/// Test: timestamp triggers a checkout after the clone
#[tokio::test]
async fn test_timestamp_checks_out_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new().with_depot("alice/hw1", FakeDepot::sample());
    let p = pipeline(
        config(dir.path()).with_timestamp(Some(Timestamp::parse("2024-05-01 12:00").unwrap())),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let record = p.correct(&depot("alice/hw1")).await;
    assert_eq!(record.status(), Status::Exited(0));
    assert_eq!(fetcher.checkout_count(), 1);
}

/// Test: no commit before the timestamp is reported like a failed clone
#[tokio::test]
async fn test_no_commit_before_timestamp_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher =
        FakeFetcher::new().with_depot("late/hw1", FakeDepot::sample().without_history());
    let builder = FakeBuilder::succeeding();
    let p = pipeline(
        config(dir.path()).with_timestamp(Some(Timestamp::parse("2024-05-01 12:00").unwrap())),
        &fetcher,
        &builder,
        &FakeRunner::exiting(0),
    );

    let record = p.correct(&depot("late/hw1")).await;
    assert_eq!(record.status().code(), -1);
    assert_eq!(builder.calls(), 0);
}

/// Test: without a timestamp no checkout happens
#[tokio::test]
async fn test_no_timestamp_skips_checkout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher =
        FakeFetcher::new().with_depot("alice/hw1", FakeDepot::sample().without_history());
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let record = p.correct(&depot("alice/hw1")).await;
    assert_eq!(record.status(), Status::Exited(0));
    assert_eq!(fetcher.checkout_count(), 0);
}

/// Test: a run that cannot complete reports -4
#[tokio::test]
async fn test_run_failure_reports_sentinel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new().with_depot("loop/hw1", FakeDepot::sample());
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::hanging(),
    );

    let record = p.correct(&depot("loop/hw1")).await;
    assert_eq!(record.status(), Status::Failed(FailureReason::Run));
    assert_eq!(record.to_string(), "loop-hw1 -4");
}

/// Test: show-log prints the log after depots that ran, only
#[tokio::test]
async fn test_show_log_follows_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new()
        .with_depot("alice/hw1", FakeDepot::sample())
        .with_depot("carol/hw1", FakeDepot::sample());
    let p = pipeline(
        config(dir.path()).with_show_log(true),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let depots = vec![depot("alice/hw1"), depot("bob/hw1")];
    let mut out = Vec::new();
    p.run_batch(&depots, OutputFormat::Text, &mut out)
        .await
        .expect("batch failed");

    let output = String::from_utf8(out).expect("utf8");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "alice-hw1 0");
    assert!(lines[1].contains("Submit homework"));
    assert_eq!(lines[2], "bob-hw1-1");
    assert_eq!(lines.len(), 3, "No log for a depot that failed to clone");
}

/// Test: JSON report lines
#[tokio::test]
async fn test_json_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new().with_depot("alice/hw1", FakeDepot::sample());
    let p = pipeline(
        config(dir.path()),
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(3),
    );

    let mut out = Vec::new();
    p.run_batch(&[depot("alice/hw1")], OutputFormat::Json, &mut out)
        .await
        .expect("batch failed");

    let value: serde_json::Value =
        serde_json::from_str(String::from_utf8(out).unwrap().trim()).expect("json");
    assert_eq!(value["depot"], "alice/hw1");
    assert_eq!(value["status"], 3);
}

/// Test: replace_existing clears a stale clone directory first
#[tokio::test]
async fn test_replace_existing_removes_stale_clone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stale = dir.path().join("alice-hw1");
    std::fs::create_dir_all(&stale).expect("mkdir");
    std::fs::write(stale.join("leftover.o"), "junk").expect("write");

    let fetcher = FakeFetcher::new().with_depot("alice/hw1", FakeDepot::sample());
    let mut cfg = config(dir.path());
    cfg.replace_existing = true;
    let p = pipeline(
        cfg,
        &fetcher,
        &FakeBuilder::succeeding(),
        &FakeRunner::exiting(0),
    );

    let record = p.correct(&depot("alice/hw1")).await;
    assert_eq!(record.status(), Status::Exited(0));
    assert!(!stale.join("leftover.o").exists());
    assert!(stale.join("main.c").exists());
}
