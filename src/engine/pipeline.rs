//! Per-file PP -> REPLAY pipeline and the batch driver around it.
//!
//! For an input `dir/<stem>.but` every working file lives next to the input:
//!
//! | file | written by | fate |
//! |---|---|---|
//! | `<stem>.goal` | pipeline | deleted after stage 1 |
//! | `<stem>.trace` | PP | routed to `trace/`, or deleted if stage 1 failed |
//! | `<stem>.res` | PP | kept |
//! | `<stem>.replay.goal` | pipeline | deleted |
//! | `<stem>.replay` | pipeline (REPLAY stdout) | routed to `replay/` |
//! | `<stem>.replay.res` | REPLAY | deleted |
//!
//! Failures never escape a file: every problem ends up in the returned
//! [`FileRun`] and the batch moves on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::backend::{Prover, StageInvocation};
use crate::core::{BenchmarkRun, FileRun, Stage, StageOutcome};
use crate::directive::{Translation, replay_directive, translate_goal};
use crate::storage::layout::remove_if_exists;
use crate::storage::{ArtifactPaths, Routed};
use crate::{BenchError, BenchResult, sha256_hex};

/// Replay stdout must be longer than this many characters to count as a replay.
pub const MIN_REPLAY_OUTPUT_CHARS: usize = 10;

/// Knobs of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub stage1_timeout: Duration,
    pub stage2_timeout: Duration,
    pub min_replay_output_chars: usize,
    /// Files processed concurrently; 1 keeps the run sequential.
    pub jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            stage1_timeout: Duration::from_secs(60),
            stage2_timeout: Duration::from_secs(120),
            min_replay_output_chars: MIN_REPLAY_OUTPUT_CHARS,
            jobs: 1,
        }
    }
}

impl PipelineConfig {
    pub fn with_timeouts(mut self, stage1: Duration, stage2: Duration) -> Self {
        self.stage1_timeout = stage1;
        self.stage2_timeout = stage2;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    fn timeout(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Prove => self.stage1_timeout,
            Stage::Replay => self.stage2_timeout,
        }
    }
}

/// Steps of the per-file state machine, as they appear in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Goal1Written,
    Stage1Run,
    Stage1Validated,
    StopOnFail,
    Goal2Written,
    Stage2Run,
    Stage2Validated,
    Routed,
    Cleaned,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Start => "START",
            PipelineState::Goal1Written => "GOAL1_WRITTEN",
            PipelineState::Stage1Run => "STAGE1_RUN",
            PipelineState::Stage1Validated => "STAGE1_VALIDATED",
            PipelineState::StopOnFail => "STOP_ON_FAIL",
            PipelineState::Goal2Written => "GOAL2_WRITTEN",
            PipelineState::Stage2Run => "STAGE2_RUN",
            PipelineState::Stage2Validated => "STAGE2_VALIDATED",
            PipelineState::Routed => "ROUTED",
            PipelineState::Cleaned => "CLEANED",
            PipelineState::Done => "DONE",
        };
        f.write_str(s)
    }
}

fn enter(state: PipelineState) {
    debug!(%state, "pipeline state");
}

/// Working file names for one input.
#[derive(Debug, Clone)]
struct WorkFiles {
    dir: PathBuf,
    stem: String,
}

impl WorkFiles {
    fn for_input(input: &Path) -> Self {
        let dir = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        WorkFiles { dir, stem }
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.stem)
    }

    fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(self.name(suffix))
    }
}

/// Contents of a result-flag file: trimmed, leading byte-order mark removed.
/// Empty or unreadable files give `None`.
pub fn read_result_label(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let label = text.trim().trim_start_matches('\u{feff}').trim();
    (!label.is_empty()).then(|| label.to_string())
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

fn io_failure(outcome: StageOutcome, error: String) -> StageOutcome {
    StageOutcome { succeeded: false, error_message: Some(crate::truncate_error(&error)), ..outcome }
}

/// Drives inputs through both stages with one prover and one output layout.
pub struct Pipeline<'a> {
    prover: &'a dyn Prover,
    paths: &'a ArtifactPaths,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(prover: &'a dyn Prover, paths: &'a ArtifactPaths, config: PipelineConfig) -> Self {
        Pipeline { prover, paths, config }
    }

    fn run_stage(&self, stage: Stage, files: &WorkFiles, directive: &str, capture: bool) -> crate::backend::StageRun {
        let directive = PathBuf::from(directive);
        self.prover.run_stage(&StageInvocation {
            stage,
            directive: &directive,
            work_dir: &files.dir,
            timeout: self.config.timeout(stage),
            capture_stdout: capture,
        })
    }

    /// Run one input through the whole pipeline.
    pub fn process_file(&self, input: &Path) -> FileRun {
        let mut run = FileRun::new(input);
        let span = info_span!("file", name = %run.source_name);
        let _guard = span.enter();
        enter(PipelineState::Start);

        let files = WorkFiles::for_input(input);
        let goal_name = files.name(".goal");
        let goal = files.path(".goal");
        let trace = files.path(".trace");

        let content = match fs::read(input) {
            Ok(bytes) => {
                run.input_sha256 = Some(sha256_hex(&bytes));
                String::from_utf8(bytes).map_err(|e| format!("input is not valid UTF-8: {e}"))
            }
            Err(e) => Err(format!("failed to read input: {e}")),
        };
        let content = match content {
            Ok(content) => content,
            Err(error) => {
                warn!(%error, "skipping input");
                run.stage1 = Some(StageOutcome::failed(Duration::ZERO, &error));
                return run;
            }
        };

        let translation = translate_goal(&content, &files.name(".trace"), &files.name(".res"));
        if let Translation::Unchanged(_) = translation {
            warn!("directive not recognised; running it unchanged without trace capture");
        }
        if let Err(e) = fs::write(&goal, translation.text()) {
            let error = BenchError::io("failed to write", &goal, e).to_string();
            run.stage1 = Some(StageOutcome::failed(Duration::ZERO, &error));
            return run;
        }
        enter(PipelineState::Goal1Written);

        let stage1 = self.run_stage(Stage::Prove, &files, &goal_name, false).outcome;
        enter(PipelineState::Stage1Run);

        let stage1 = stage1.with_artifact_check(file_size(&trace));
        if let Some(label) = read_result_label(&files.path(".res")) {
            run.result_label = label;
        }
        remove_if_exists(&goal);
        enter(PipelineState::Stage1Validated);
        info!(
            stage = %Stage::Prove,
            ok = stage1.succeeded,
            timed_out = stage1.timed_out,
            elapsed_s = stage1.elapsed_seconds,
            result = %run.result_label,
            "stage finished"
        );

        let stage1_ok = stage1.succeeded;
        if !stage1_ok {
            debug!(error = ?stage1.error_message, "PP failed");
        }
        run.stage1 = Some(stage1);
        if !stage1_ok {
            remove_if_exists(&trace);
            enter(PipelineState::StopOnFail);
            return run;
        }

        let routed_trace = match self.paths.route(&trace) {
            Ok(Routed::Moved(p)) => std::path::absolute(&p).unwrap_or(p),
            Ok(other) => {
                let error = format!("trace not routed: {other:?}");
                run.stage2 = Some(StageOutcome::failed(Duration::ZERO, &error));
                return run;
            }
            Err(e) => {
                run.stage2 = Some(StageOutcome::failed(Duration::ZERO, &e.to_string()));
                return run;
            }
        };

        let replay_goal_name = files.name(".replay.goal");
        let replay_goal = files.path(".replay.goal");
        let replay_file = files.path(".replay");
        let replay_res = files.path(".replay.res");

        let directive = replay_directive(&routed_trace.to_string_lossy(), &files.name(".replay.res"));
        if let Err(e) = fs::write(&replay_goal, directive) {
            let error = BenchError::io("failed to write", &replay_goal, e).to_string();
            run.stage2 = Some(StageOutcome::failed(Duration::ZERO, &error));
            self.cleanup(&files);
            return run;
        }
        enter(PipelineState::Goal2Written);

        let stage2_run = self.run_stage(Stage::Replay, &files, &replay_goal_name, true);
        enter(PipelineState::Stage2Run);

        let mut stage2 = stage2_run
            .outcome
            .with_replay_output(stage2_run.stdout.as_deref(), self.config.min_replay_output_chars);
        if stage2.succeeded {
            if let Some(stdout) = stage2_run.stdout.as_deref() {
                if let Err(e) = fs::write(&replay_file, stdout) {
                    let error = BenchError::io("failed to write", &replay_file, e).to_string();
                    stage2 = io_failure(stage2, error);
                }
            }
        }
        enter(PipelineState::Stage2Validated);
        info!(
            stage = %Stage::Replay,
            ok = stage2.succeeded,
            timed_out = stage2.timed_out,
            elapsed_s = stage2.elapsed_seconds,
            "stage finished"
        );
        run.stage2 = Some(stage2);

        if let Err(e) = self.paths.route(&replay_file) {
            warn!(error = %e, "failed to route replay");
        }
        enter(PipelineState::Routed);

        remove_if_exists(&replay_goal);
        remove_if_exists(&replay_res);
        self.cleanup(&files);
        enter(PipelineState::Cleaned);

        enter(PipelineState::Done);
        run
    }

    /// Drop the replay working copy and route a stray extensionless `<stem>` file.
    fn cleanup(&self, files: &WorkFiles) {
        remove_if_exists(&files.path(".replay.goal"));
        remove_if_exists(&files.path(".replay"));
        let bare = files.path("");
        if bare.is_file() && bare.extension().is_none() {
            if let Err(e) = self.paths.route(&bare) {
                warn!(error = %e, "failed to route extensionless artifact");
            }
        }
    }

    /// Process every input, in order, calling `on_file` as each one finishes.
    ///
    /// With `jobs > 1` files run on a thread pool; the returned run still lists
    /// them in input order.
    pub fn run_batch<F>(&self, inputs: &[PathBuf], on_file: F) -> BenchResult<BenchmarkRun>
    where
        F: Fn(&FileRun) + Send + Sync,
    {
        info!(prover = self.prover.name(), files = inputs.len(), "running batch");
        let mut batch = BenchmarkRun::new(self.config.stage1_timeout, self.config.stage2_timeout);
        let process = |input: &PathBuf| {
            let run = self.process_file(input);
            on_file(&run);
            run
        };
        batch.files = if self.config.jobs <= 1 {
            inputs.iter().map(process).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|e| BenchError::Message(format!("failed to build thread pool: {e}")))?;
            pool.install(|| inputs.par_iter().map(process).collect())
        };
        Ok(batch)
    }
}
