//! Re-analysis of an existing failure archive.
//!
//! Every `*.replay.goal` in `replay-failures/` is replayed again with a short
//! timeout to recover the real error text, then classified like a fresh run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{ProcessExit, run_bounded};
use crate::core::Stage;
use crate::engine::KrtToolchain;
use crate::{BenchError, BenchResult, truncate_error};

use super::classify::{FailureRecord, FailureReport, classify};

pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);
/// A re-run counts as a success only with more stdout than this.
pub const MIN_ANALYZE_OUTPUT_CHARS: usize = 100;
const TOP_RULES: usize = 5;
const REPLAY_GOAL_SUFFIX: &str = ".replay.goal";

/// Shape of a trace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    pub size_bytes: u64,
    pub lines: usize,
    pub rule_applications: usize,
    pub unique_rules: usize,
    /// Most frequent rules, most frequent first; ties by name.
    pub top_rules: Vec<(String, usize)>,
}

/// Rule name of a `[name(args)]...` line.
fn rule_name(line: &str) -> Option<&str> {
    let body = line.strip_prefix('[')?;
    let body = &body[..body.find(']')?];
    Some(body.split('(').next().unwrap_or(body))
}

pub fn trace_stats_from_text(text: &str, size_bytes: u64) -> TraceStats {
    let trimmed = text.trim();
    let lines = if trimmed.is_empty() { 0 } else { trimmed.lines().count() };
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in trimmed.lines().filter_map(|l| rule_name(l.trim())) {
        *counts.entry(name).or_default() += 1;
    }
    let rule_applications = counts.values().sum();
    let unique_rules = counts.len();
    let mut top: Vec<(String, usize)> = counts.into_iter().map(|(n, c)| (n.to_string(), c)).collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(TOP_RULES);
    TraceStats { size_bytes, lines, rule_applications, unique_rules, top_rules: top }
}

pub fn trace_stats(path: &Path) -> BenchResult<TraceStats> {
    let bytes = fs::read(path).map_err(|e| BenchError::io("failed to read", path, e))?;
    Ok(trace_stats_from_text(&String::from_utf8_lossy(&bytes), bytes.len() as u64))
}

/// Archived replay directives, sorted. A missing archive yields nothing.
pub fn archived_goals(archive: &Path) -> BenchResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(archive) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BenchError::io("failed to list", archive, e)),
    };
    let mut goals = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BenchError::io("failed to list", archive, e))?.path();
        let is_goal = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(REPLAY_GOAL_SUFFIX));
        if is_goal && path.is_file() {
            goals.push(path);
        }
    }
    goals.sort();
    Ok(goals)
}

/// `(succeeded, error text)` of one re-run.
fn rerun(toolchain: &KrtToolchain, archive: &Path, goal_name: &str, timeout: Duration) -> (bool, String) {
    let mut cmd = Command::new(&toolchain.krt);
    cmd.arg("-b").arg(toolchain.module(Stage::Replay)).arg(goal_name).current_dir(archive);
    match run_bounded(cmd, timeout).exit {
        ProcessExit::Exited { status, stdout, stderr } => {
            let succeeded = status.success() && stdout.chars().count() > MIN_ANALYZE_OUTPUT_CHARS;
            (succeeded, truncate_error(&format!("{stdout}{stderr}")))
        }
        ProcessExit::TimedOut => (false, "Timeout".to_string()),
        ProcessExit::Failed(e) => (false, truncate_error(&e)),
    }
}

/// Replay every archived failure again and classify the ones that still fail.
pub fn analyze_failures(
    toolchain: &KrtToolchain,
    archive: &Path,
    threshold: u64,
    timeout: Duration,
) -> BenchResult<FailureReport> {
    let mut report = FailureReport::default();
    for goal in archived_goals(archive)? {
        let goal_name = goal.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let stem = goal_name.strip_suffix(REPLAY_GOAL_SUFFIX).unwrap_or(&goal_name).to_string();
        let trace = archive.join(format!("{stem}.trace"));
        let size = fs::metadata(&trace).map(|m| m.len()).unwrap_or(0);

        let (succeeded, error) = rerun(toolchain, archive, &goal_name, timeout);
        if succeeded {
            info!(name = %stem, "archived failure now replays, skipped");
            continue;
        }
        let error = Some(error).filter(|e| !e.is_empty());
        let category = classify(error.as_deref(), size, threshold);
        let trace_stats = if size > threshold { trace_stats(&trace).ok() } else { None };
        debug!(name = %stem, %category, "reanalysed");
        report.push(FailureRecord {
            identifier: stem,
            artifact_size_bytes: size,
            raw_error: error,
            category,
            trace_stats,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::FailureCategory;

    #[test]
    fn test_rule_name() {
        assert_eq!(rule_name("[axiom(3)] foo"), Some("axiom"));
        assert_eq!(rule_name("[cut] bar"), Some("cut"));
        assert_eq!(rule_name("no rule"), None);
        assert_eq!(rule_name("[unterminated"), None);
    }

    #[test]
    fn test_trace_stats_counts_rules() {
        let text = "[and(1)] a\n[and(2)] b\n  [or] c\nplain\n[imp(x)] d\n[and] e\n";
        let stats = trace_stats_from_text(text, 99);
        assert_eq!(stats.size_bytes, 99);
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.rule_applications, 5);
        assert_eq!(stats.unique_rules, 3);
        assert_eq!(stats.top_rules[0], ("and".to_string(), 3));
        assert_eq!(stats.top_rules[1], ("imp".to_string(), 1));
    }

    #[test]
    fn test_top_rules_bounded() {
        let text: String = (0..8).map(|i| format!("[r{i}]\n")).collect();
        assert_eq!(trace_stats_from_text(&text, 0).top_rules.len(), TOP_RULES);
        assert_eq!(trace_stats_from_text("", 0).lines, 0);
    }

    #[test]
    fn test_archived_goals_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.replay.goal", "a.replay.goal", "a.trace", "a.goal"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let goals = archived_goals(dir.path()).unwrap();
        assert_eq!(goals, vec![dir.path().join("a.replay.goal"), dir.path().join("b.replay.goal")]);
        assert!(archived_goals(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_analyze_reruns_with_fake_krt() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let krt = dir.path().join("krt");
        fs::write(
            &krt,
            "#!/bin/bash\ncase \"$3\" in\n  deep.replay.goal) echo 'GOALS STACK OVERFLOW'; exit 1;;\n  fine.replay.goal) head -c 300 /dev/zero | tr '\\0' r; exit 0;;\n  *) exit 2;;\nesac\n",
        )
        .unwrap();
        fs::set_permissions(&krt, fs::Permissions::from_mode(0o755)).unwrap();

        let archive = dir.path().join("replay-failures");
        fs::create_dir(&archive).unwrap();
        fs::write(archive.join("deep.replay.goal"), "x").unwrap();
        fs::write(archive.join("deep.trace"), "[and(1)] a\n[and(2)] b\n[or] c\n").unwrap();
        fs::write(archive.join("fine.replay.goal"), "x").unwrap();
        fs::write(archive.join("silent.replay.goal"), "x").unwrap();

        let toolchain = KrtToolchain::new(&krt, "PP.kin", "REPLAY.kin");
        let report = analyze_failures(&toolchain, &archive, 10, ANALYZE_TIMEOUT).unwrap();
        assert_eq!(report.total(), 2);

        let deep = &report.get(FailureCategory::StackOverflow)[0];
        assert_eq!(deep.identifier, "deep");
        let stats = deep.trace_stats.as_ref().unwrap();
        assert_eq!(stats.rule_applications, 3);

        let silent = &report.get(FailureCategory::EmptyArtifact)[0];
        assert_eq!(silent.artifact_size_bytes, 0);
        assert!(silent.raw_error.is_none());
        assert!(silent.trace_stats.is_none());
    }
}
