//! Conformance run: every scenario, one JSONL log, one artifact index.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::scenarios::{self, Scenario, ScenarioContext, ScenarioReport};
use crate::structured_log::{ArtifactIndex, LogEmitter, LogLevel, Outcome};

pub const SUITE: &str = "conformance";
pub const LOG_FILE: &str = "conformance.log.jsonl";
pub const INDEX_FILE: &str = "artifact_index.json";

/// Totals and output paths of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ConformanceSummary {
    pub run_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: Vec<String>,
    /// Scenarios left out by the selection.
    pub skipped: usize,
    pub log_path: PathBuf,
    pub index_path: PathBuf,
}

impl ConformanceSummary {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs `selected` (or every scenario) and writes the log and index into
/// `out_dir`.
pub fn run_conformance(
    config: &HarnessConfig,
    out_dir: &Path,
    run_id: &str,
    selected: &[String],
) -> Result<ConformanceSummary, HarnessError> {
    let plan = select(selected)?;
    std::fs::create_dir_all(out_dir)?;
    let log_path = out_dir.join(LOG_FILE);
    let index_path = out_dir.join(INDEX_FILE);

    let mut emitter = LogEmitter::to_file(&log_path, SUITE, run_id)?.with_min_level(config.min_level);
    let ctx = ScenarioContext::from(config);

    let start = emitter.entry(LogLevel::Info, "run_start").with_details(json!({
        "host": config.host,
        "short_timeout_s": config.short_timeout,
        "scenarios": plan.len(),
    }));
    emitter.emit_entry(start)?;

    let mut skipped = 0;
    for scenario in scenarios::all() {
        if plan.iter().any(|planned| planned.name == scenario.name) {
            continue;
        }
        skipped += 1;
        let skip = emitter
            .entry(LogLevel::Debug, "scenario_skipped")
            .with_op(scenario.op)
            .with_outcome(Outcome::Skip)
            .with_details(json!({ "scenario": scenario.name }));
        emitter.emit_entry(skip)?;
    }

    let mut passed = 0;
    let mut failed = Vec::new();
    for scenario in plan {
        let begin = emitter
            .entry(LogLevel::Debug, "scenario_start")
            .with_op(scenario.op)
            .with_details(json!({ "scenario": scenario.name, "summary": scenario.summary }));
        emitter.emit_entry(begin)?;

        let report = scenario.run(&ctx);
        log_report(&mut emitter, &report)?;
        if report.passed() {
            passed += 1;
        } else {
            failed.push(report.name.to_string());
        }
    }

    let outcome = if failed.is_empty() { Outcome::Pass } else { Outcome::Fail };
    let level = if failed.is_empty() { LogLevel::Info } else { LogLevel::Error };
    let end = emitter
        .entry(level, "run_end")
        .with_outcome(outcome)
        .with_artifacts(vec![INDEX_FILE.to_string()])
        .with_details(json!({ "passed": passed, "failed": failed, "skipped": skipped }));
    emitter.emit_entry(end)?;
    emitter.flush()?;
    drop(emitter);

    let mut index = ArtifactIndex::new(run_id, SUITE);
    index.add_file(&log_path, LOG_FILE, "log")?;
    std::fs::write(&index_path, index.to_json()?)?;

    Ok(ConformanceSummary {
        run_id: run_id.to_string(),
        total: passed + failed.len(),
        passed,
        failed,
        skipped,
        log_path,
        index_path,
    })
}

fn select(names: &[String]) -> Result<Vec<&'static Scenario>, HarnessError> {
    if names.is_empty() {
        return Ok(scenarios::all().iter().collect());
    }
    names
        .iter()
        .map(|name| {
            scenarios::find(name)
                .ok_or_else(|| HarnessError::check(format!("unknown scenario '{name}'")))
        })
        .collect()
}

fn log_report(emitter: &mut LogEmitter, report: &ScenarioReport) -> Result<(), HarnessError> {
    let entry = emitter
        .entry(LogLevel::Info, "scenario_end")
        .with_op(report.op)
        .with_latency_ns(report.latency_ns);
    let entry = match &report.result {
        Ok(observed) => {
            let mut entry = entry
                .with_outcome(Outcome::Pass)
                .with_timeout(observed.timeout)
                .with_details(json!({ "scenario": report.name, "observed": observed.details }));
            if let Some(bytes) = observed.bytes {
                entry = entry.with_bytes(bytes);
            }
            entry
        }
        Err(err) => {
            let mut entry = entry.with_outcome(Outcome::Fail).with_details(json!({
                "scenario": report.name,
                "failure": err.to_string(),
            }));
            entry.level = LogLevel::Error;
            if let Some(socket_err) = err.socket_error() {
                entry = entry.with_error(socket_err);
            }
            entry
        }
    };
    emitter.emit_entry(entry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_defaults_to_everything() {
        assert_eq!(select(&[]).unwrap().len(), scenarios::all().len());
    }

    #[test]
    fn select_rejects_unknown_names() {
        let err = select(&["bogus".to_string()]).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }
}
