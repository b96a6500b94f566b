//! Prover trait and the request/response types of one stage execution.

use std::path::Path;
use std::time::Duration;

use crate::core::{Stage, StageOutcome};

/// One request to run a stage.
#[derive(Debug, Clone)]
pub struct StageInvocation<'a> {
    pub stage: Stage,
    /// Directive file name, relative to `work_dir`.
    pub directive: &'a Path,
    /// Working directory of the prover process.
    pub work_dir: &'a Path,
    pub timeout: Duration,
    /// Return stdout to the caller (the replay stage's output is its stdout).
    pub capture_stdout: bool,
}

/// What a stage execution produced.
#[derive(Debug, Clone)]
pub struct StageRun {
    pub outcome: StageOutcome,
    /// Present only when requested and non-empty.
    pub stdout: Option<String>,
}

/// An external proof engine driven stage by stage.
///
/// Implementations must not fail: every problem (timeout, launch failure,
/// non-zero exit) is reported through the returned `StageOutcome`.
pub trait Prover: Send + Sync {
    /// Returns the prover name (e.g., "krt", "mock").
    fn name(&self) -> &str;

    /// Run one stage to completion or until its timeout.
    fn run_stage(&self, invocation: &StageInvocation<'_>) -> StageRun;
}
