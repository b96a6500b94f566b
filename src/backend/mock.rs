//! Mock prover for testing.
//!
//! Each stage is scripted: which files appear in the working directory, what is
//! printed, and how the process exits. File names may use `{stem}`, replaced by
//! the directive's base name (`g1.goal` and `g1.replay.goal` both give `g1`).

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::{Stage, StageOutcome};

use super::krt::select_error;
use super::traits::{Prover, StageInvocation, StageRun};

/// Scripted behaviour of one stage.
#[derive(Debug, Clone, Default)]
pub struct MockStage {
    /// Exit code to report; `None` simulates a timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Files to create in the working directory, `(name template, contents)`.
    pub files: Vec<(String, Vec<u8>)>,
    pub elapsed: Duration,
}

impl MockStage {
    /// Exits with `code` and produces nothing.
    pub fn exits(code: i32) -> Self {
        MockStage { exit_code: Some(code), elapsed: Duration::from_millis(10), ..Default::default() }
    }

    pub fn timing_out() -> Self {
        MockStage { exit_code: None, ..Default::default() }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn writing(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((name.into(), contents.into()));
        self
    }
}

/// Prover whose stages follow a script; records every invocation.
#[derive(Debug)]
pub struct MockProver {
    pub prove: MockStage,
    pub replay: MockStage,
    calls: Mutex<Vec<(Stage, String)>>,
}

fn directive_stem(directive: &Path) -> String {
    let name = directive.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    name.strip_suffix(".replay.goal")
        .or_else(|| name.strip_suffix(".goal"))
        .unwrap_or(&name)
        .to_string()
}

impl MockProver {
    pub fn new(prove: MockStage, replay: MockStage) -> Self {
        MockProver { prove, replay, calls: Mutex::new(Vec::new()) }
    }

    /// `(stage, directive contents)` for every stage run so far.
    pub fn calls(&self) -> Vec<(Stage, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Prover for MockProver {
    fn name(&self) -> &str {
        "mock"
    }

    fn run_stage(&self, invocation: &StageInvocation<'_>) -> StageRun {
        let script = match invocation.stage {
            Stage::Prove => &self.prove,
            Stage::Replay => &self.replay,
        };
        let directive_path = invocation.work_dir.join(invocation.directive);
        let directive = std::fs::read_to_string(&directive_path).unwrap_or_default();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((invocation.stage, directive));
        }

        let stem = directive_stem(invocation.directive);
        for (template, contents) in &script.files {
            let name = template.replace("{stem}", &stem);
            let _ = std::fs::write(invocation.work_dir.join(name), contents);
        }

        let Some(code) = script.exit_code else {
            return StageRun {
                outcome: StageOutcome::timed_out(invocation.timeout, invocation.timeout),
                stdout: None,
            };
        };
        let error = select_error(code == 0, &script.stdout, &script.stderr);
        let outcome =
            StageOutcome::finished(Some(code), script.elapsed, error, script.stdout.len() as u64);
        let stdout = (invocation.capture_stdout && !script.stdout.is_empty())
            .then(|| script.stdout.clone());
        StageRun { outcome, stdout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_stem() {
        assert_eq!(directive_stem(Path::new("g1.goal")), "g1");
        assert_eq!(directive_stem(Path::new("g1.replay.goal")), "g1");
        assert_eq!(directive_stem(Path::new("odd")), "odd");
    }

    #[test]
    fn test_mock_writes_files_and_records_calls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("g1.goal"), "P").unwrap();
        let prover = MockProver::new(
            MockStage::exits(0).writing("{stem}.trace", vec![b't'; 50]),
            MockStage::exits(0),
        );
        let run = prover.run_stage(&StageInvocation {
            stage: Stage::Prove,
            directive: Path::new("g1.goal"),
            work_dir: dir.path(),
            timeout: Duration::from_secs(1),
            capture_stdout: false,
        });
        assert!(run.outcome.succeeded);
        assert_eq!(std::fs::metadata(dir.path().join("g1.trace")).unwrap().len(), 50);
        assert_eq!(prover.calls(), vec![(Stage::Prove, "P".to_string())]);
    }

    #[test]
    fn test_mock_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let prover = MockProver::new(MockStage::timing_out(), MockStage::exits(0));
        let run = prover.run_stage(&StageInvocation {
            stage: Stage::Prove,
            directive: Path::new("g1.goal"),
            work_dir: dir.path(),
            timeout: Duration::from_secs(3),
            capture_stdout: true,
        });
        assert!(run.outcome.timed_out);
        assert!(!run.outcome.succeeded);
        assert!(run.stdout.is_none());
    }
}
