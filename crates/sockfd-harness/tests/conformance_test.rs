//! Integration test: the conformance scenarios pass against the real kernel
//! and the run leaves a valid, indexed log behind.

use sockfd_harness::runner::{INDEX_FILE, LOG_FILE};
use sockfd_harness::scenarios::{self, ScenarioContext};
use sockfd_harness::structured_log::{
    ArtifactIndex, LogEntry, LogLevel, Outcome, sha256_hex, validate_log_file,
};
use sockfd_harness::{HarnessConfig, run_conformance};

#[test]
fn every_scenario_passes() {
    let ctx = ScenarioContext::default();
    let failures: Vec<String> = scenarios::all()
        .iter()
        .map(|s| s.run(&ctx))
        .filter(|report| !report.passed())
        .map(|report| format!("{}: {:?}", report.name, report.result))
        .collect();
    assert!(failures.is_empty(), "{failures:#?}");
}

#[test]
fn run_writes_a_valid_log_and_index() {
    let out_dir = std::env::temp_dir().join(format!("sockfd-conformance-{}", std::process::id()));
    let selected = vec![
        "accept_times_out".to_string(),
        "send_recv_in_order".to_string(),
        "bind_address_in_use".to_string(),
    ];
    let summary = run_conformance(&HarnessConfig::default(), &out_dir, "run-test", &selected).unwrap();

    assert!(summary.all_passed(), "{:?}", summary.failed);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 3);
    assert_eq!(summary.skipped, scenarios::all().len() - 3);
    assert_eq!(summary.log_path, out_dir.join(LOG_FILE));

    let (lines, errors) = validate_log_file(&summary.log_path).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    // run_start + scenario_end per scenario + run_end; debug starts are filtered.
    assert_eq!(lines, 5);

    let index: ArtifactIndex =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join(INDEX_FILE)).unwrap()).unwrap();
    assert_eq!(index.run_id, "run-test");
    assert_eq!(index.artifacts.len(), 1);
    let log_bytes = std::fs::read(&summary.log_path).unwrap();
    assert_eq!(index.artifacts[0].sha256, sha256_hex(&log_bytes));
    std::fs::remove_dir_all(out_dir).ok();
}

#[test]
fn unknown_scenario_is_rejected_before_running() {
    let out_dir = std::env::temp_dir().join(format!("sockfd-unknown-{}", std::process::id()));
    let err = run_conformance(
        &HarnessConfig::default(),
        &out_dir,
        "run-x",
        &["no_such_scenario".to_string()],
    )
    .unwrap_err();
    assert!(err.to_string().contains("no_such_scenario"));
    assert!(!out_dir.join(LOG_FILE).exists());
}

#[test]
fn unselected_scenarios_are_logged_as_skipped_at_debug() {
    let out_dir = std::env::temp_dir().join(format!("sockfd-skipped-{}", std::process::id()));
    let config = HarnessConfig {
        min_level: LogLevel::Debug,
        ..HarnessConfig::default()
    };
    let summary =
        run_conformance(&config, &out_dir, "run-skip", &["accept_times_out".to_string()]).unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.skipped, scenarios::all().len() - 1);

    let (_, errors) = validate_log_file(&summary.log_path).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    let skipped = std::fs::read_to_string(&summary.log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<LogEntry>(line).unwrap())
        .filter(|entry| entry.outcome == Some(Outcome::Skip))
        .inspect(|entry| assert_eq!(entry.event, "scenario_skipped"))
        .count();
    assert_eq!(skipped, summary.skipped);
    std::fs::remove_dir_all(out_dir).ok();
}
