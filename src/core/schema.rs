//! Stage, file and batch records produced by the pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result label used when the prover left no result-flag file behind.
pub const UNKNOWN_RESULT: &str = "UNKNOWN";

/// The two passes every input goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Proving pass (PP), produces the trace.
    Prove,
    /// Replay-verification pass (REPLAY), consumes the trace.
    Replay,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Prove => "PP",
            Stage::Replay => "REPLAY",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one bounded execution of the external prover.
///
/// Values are never edited in place: the validation rules of the pipeline
/// (`with_artifact_check`, `with_replay_output`) return a new outcome.
/// A timed-out outcome is never successful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    #[serde(rename = "success")]
    pub succeeded: bool,
    #[serde(rename = "timeout")]
    pub timed_out: bool,
    pub elapsed_seconds: f64,
    #[serde(rename = "error")]
    pub error_message: Option<String>,
    #[serde(rename = "output_size")]
    pub output_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_memory_bytes: Option<u64>,
}

impl StageOutcome {
    /// The process ran to completion. `error_message` is dropped for successful runs.
    pub fn finished(
        exit_code: Option<i32>,
        elapsed: Duration,
        error_message: Option<String>,
        output_size_bytes: u64,
    ) -> Self {
        let succeeded = exit_code == Some(0);
        StageOutcome {
            succeeded,
            timed_out: false,
            elapsed_seconds: elapsed.as_secs_f64(),
            error_message: if succeeded { None } else { error_message },
            output_size_bytes,
            exit_code,
            peak_memory_bytes: None,
        }
    }

    /// The process hit its deadline and was killed.
    pub fn timed_out(elapsed: Duration, timeout: Duration) -> Self {
        StageOutcome {
            succeeded: false,
            timed_out: true,
            elapsed_seconds: elapsed.as_secs_f64(),
            error_message: Some(format!("Timeout after {:?}s", timeout.as_secs_f64())),
            output_size_bytes: 0,
            exit_code: None,
            peak_memory_bytes: None,
        }
    }

    /// The stage could not run at all (launch failure, unreadable input, unwritable directive).
    pub fn failed(elapsed: Duration, error: &str) -> Self {
        StageOutcome {
            succeeded: false,
            timed_out: false,
            elapsed_seconds: elapsed.as_secs_f64(),
            error_message: Some(crate::truncate_error(error)),
            output_size_bytes: 0,
            exit_code: None,
            peak_memory_bytes: None,
        }
    }

    pub fn with_peak_memory(mut self, peak_memory_bytes: Option<u64>) -> Self {
        self.peak_memory_bytes = peak_memory_bytes;
        self
    }

    /// Force failure, recording `default_error` only when no error text exists yet.
    pub fn into_failure(mut self, default_error: &str) -> Self {
        self.succeeded = false;
        if self.error_message.is_none() {
            self.error_message = Some(default_error.to_string());
        }
        self
    }

    /// Stage-1 rule: exit status alone is not enough, the trace must exist and be non-empty.
    ///
    /// `artifact_size` is `None` when the trace file does not exist.
    pub fn with_artifact_check(mut self, artifact_size: Option<u64>) -> Self {
        if let Some(size) = artifact_size {
            self.output_size_bytes = size;
        }
        match artifact_size {
            Some(size) if size > 0 => self,
            _ => self.into_failure("no artifact generated"),
        }
    }

    /// Stage-2 rule: the replay is the captured stdout, and a long enough stdout wins
    /// over the exit status.
    pub fn with_replay_output(mut self, stdout: Option<&str>, min_chars: usize) -> Self {
        match stdout {
            Some(text) if !self.timed_out && text.chars().count() > min_chars => {
                self.succeeded = true;
                self.output_size_bytes = text.len() as u64;
                self
            }
            _ => self.into_failure("no replay output"),
        }
    }
}

/// Per-input record, filled in by the pipeline while the file runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRun {
    #[serde(rename = "filename")]
    pub source_name: String,
    #[serde(skip)]
    pub source_path: PathBuf,
    #[serde(rename = "pp")]
    pub stage1: Option<StageOutcome>,
    #[serde(rename = "replay")]
    pub stage2: Option<StageOutcome>,
    #[serde(rename = "result")]
    pub result_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_sha256: Option<String>,
}

impl FileRun {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let source_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        FileRun {
            source_name,
            source_path,
            stage1: None,
            stage2: None,
            result_label: UNKNOWN_RESULT.to_string(),
            input_sha256: None,
        }
    }

    /// Input file name without its final suffix (`g1.but` -> `g1`).
    pub fn stem(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_name.clone())
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        match stage {
            Stage::Prove => self.stage1.as_ref(),
            Stage::Replay => self.stage2.as_ref(),
        }
    }

    pub fn total_time(&self) -> f64 {
        self.stage1.as_ref().map_or(0.0, |o| o.elapsed_seconds)
            + self.stage2.as_ref().map_or(0.0, |o| o.elapsed_seconds)
    }

    /// Stage 1 produced a trace but stage 2 did not produce a replay.
    pub fn is_replay_failure(&self) -> bool {
        self.stage1.as_ref().is_some_and(|o| o.succeeded)
            && !self.stage2.as_ref().is_some_and(|o| o.succeeded)
    }
}

/// Per-stage totals derived from a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTotals {
    pub succeeded: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub total_time_seconds: f64,
    /// Time spent in successful runs only.
    #[serde(skip)]
    pub success_time_seconds: f64,
}

impl StageTotals {
    pub fn average_success_time(&self) -> Option<f64> {
        (self.succeeded > 0).then(|| self.success_time_seconds / self.succeeded as f64)
    }
}

/// One benchmark batch. Every count is recomputed from `files` on demand.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub files: Vec<FileRun>,
    pub stage1_timeout: Duration,
    pub stage2_timeout: Duration,
}

impl BenchmarkRun {
    pub fn new(stage1_timeout: Duration, stage2_timeout: Duration) -> Self {
        BenchmarkRun { files: Vec::new(), stage1_timeout, stage2_timeout }
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn totals(&self, stage: Stage) -> StageTotals {
        self.files
            .iter()
            .filter_map(|f| f.outcome(stage))
            .fold(StageTotals::default(), |mut t, o| {
                if o.succeeded {
                    t.succeeded += 1;
                    t.success_time_seconds += o.elapsed_seconds;
                } else {
                    t.failed += 1;
                }
                if o.timed_out {
                    t.timeouts += 1;
                }
                t.total_time_seconds += o.elapsed_seconds;
                t
            })
    }

    pub fn total_time(&self) -> f64 {
        self.totals(Stage::Prove).total_time_seconds + self.totals(Stage::Replay).total_time_seconds
    }

    pub fn replay_failures(&self) -> impl Iterator<Item = &FileRun> {
        self.files.iter().filter(|f| f.is_replay_failure())
    }
}
