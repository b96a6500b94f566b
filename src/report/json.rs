//! Machine-readable batch report.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::core::{BenchmarkRun, EnvironmentInfo, Stage, StageOutcome, StageTotals};
use crate::triage::{FailureCategory, FailureReport};
use crate::{BenchError, BenchResult};

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub total_time_seconds: f64,
}

impl From<StageTotals> for StageSummary {
    fn from(t: StageTotals) -> Self {
        StageSummary {
            succeeded: t.succeeded,
            failed: t.failed,
            timeouts: t.timeouts,
            total_time_seconds: round3(t.total_time_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_files: usize,
    pub pp_timeout_seconds: f64,
    pub replay_timeout_seconds: f64,
    pub pp: StageSummary,
    pub replay: StageSummary,
    pub total_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub result: String,
    pub pp: Option<StageOutcome>,
    pub replay: Option<StageOutcome>,
    pub total_time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEntry {
    pub name: String,
    pub trace_size: u64,
}

/// Full report written by `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub generated_at: String,
    pub summary: ReportSummary,
    pub files: Vec<FileEntry>,
    pub failure_analysis: BTreeMap<FailureCategory, Vec<FailureEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentInfo>,
}

impl BenchReport {
    pub fn build(run: &BenchmarkRun, failures: &FailureReport, environment: Option<EnvironmentInfo>) -> Self {
        let summary = ReportSummary {
            total_files: run.total_files(),
            pp_timeout_seconds: run.stage1_timeout.as_secs_f64(),
            replay_timeout_seconds: run.stage2_timeout.as_secs_f64(),
            pp: run.totals(Stage::Prove).into(),
            replay: run.totals(Stage::Replay).into(),
            total_time_seconds: round3(run.total_time()),
        };
        let files = run
            .files
            .iter()
            .map(|f| FileEntry {
                filename: f.source_name.clone(),
                result: f.result_label.clone(),
                pp: f.stage1.clone(),
                replay: f.stage2.clone(),
                total_time_seconds: round3(f.total_time()),
                input_sha256: f.input_sha256.clone(),
            })
            .collect();
        let failure_analysis = failures
            .iter()
            .map(|(category, records)| {
                let entries = records
                    .iter()
                    .map(|r| FailureEntry { name: r.identifier.clone(), trace_size: r.artifact_size_bytes })
                    .collect();
                (category, entries)
            })
            .collect();
        BenchReport {
            generated_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            summary,
            files,
            failure_analysis,
            environment,
        }
    }

    pub fn to_json(&self) -> BenchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> BenchResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| BenchError::io("failed to write", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileRun;
    use crate::triage::FailureRecord;
    use std::time::Duration;

    fn batch() -> BenchmarkRun {
        let mut run = BenchmarkRun::new(Duration::from_secs(60), Duration::from_secs(120));
        let mut ok = FileRun::new("/g/ok.but");
        ok.result_label = "SUCCES".into();
        ok.stage1 = Some(StageOutcome::finished(Some(0), Duration::from_micros(1_234_567), None, 50));
        ok.stage2 = Some(StageOutcome::finished(Some(0), Duration::from_millis(500), None, 300));
        let mut bad = FileRun::new("/g/bad.but");
        bad.stage1 = Some(StageOutcome::timed_out(Duration::from_secs(60), Duration::from_secs(60)));
        run.files = vec![ok, bad];
        run
    }

    #[test]
    fn test_report_shape() {
        let mut failures = FailureReport::default();
        failures.push(FailureRecord {
            identifier: "deep".into(),
            artifact_size_bytes: 4000,
            raw_error: Some("GOALS STACK OVERFLOW".into()),
            category: FailureCategory::StackOverflow,
            trace_stats: None,
        });
        let report = BenchReport::build(&batch(), &failures, None);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["summary"]["total_files"], 2);
        assert_eq!(json["summary"]["pp_timeout_seconds"], 60.0);
        assert_eq!(json["summary"]["pp"]["succeeded"], 1);
        assert_eq!(json["summary"]["pp"]["timeouts"], 1);
        assert_eq!(json["summary"]["replay"]["succeeded"], 1);
        assert_eq!(json["summary"]["pp"]["total_time_seconds"], 61.235);
        assert_eq!(json["files"][0]["filename"], "ok.but");
        assert_eq!(json["files"][0]["result"], "SUCCES");
        assert_eq!(json["files"][0]["pp"]["success"], true);
        assert_eq!(json["files"][0]["total_time_seconds"], 1.735);
        assert!(json["files"][1]["replay"].is_null());
        assert_eq!(json["files"][1]["pp"]["timeout"], true);
        assert_eq!(json["failure_analysis"]["STACK_OVERFLOW"][0]["name"], "deep");
        assert_eq!(json["failure_analysis"]["STACK_OVERFLOW"][0]["trace_size"], 4000);
        assert!(json.get("environment").is_none());
        assert!(json["generated_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        BenchReport::build(&batch(), &FailureReport::default(), Some(EnvironmentInfo::default()))
            .write(&path)
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["failure_analysis"].as_object().unwrap().is_empty());
        assert!(json["environment"]["os"].is_string());
    }
}
