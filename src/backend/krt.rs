//! `krt` prover: runs the PP and REPLAY bytecodes through the kernel runtime.

use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::core::StageOutcome;
use crate::engine::KrtToolchain;
use crate::truncate_error;

use super::process::{ProcessExit, ProcessReport, run_bounded};
use super::traits::{Prover, StageInvocation, StageRun};

/// Error text of a finished run: stderr, or stdout when the run failed and printed something.
pub(crate) fn select_error(succeeded: bool, stdout: &str, stderr: &str) -> Option<String> {
    if !succeeded {
        let from_stdout = truncate_error(stdout);
        if !from_stdout.is_empty() {
            return Some(from_stdout);
        }
    }
    Some(truncate_error(stderr)).filter(|e| !e.is_empty())
}

/// Turn a raw process report into a stage outcome plus the optional stdout.
///
/// `krt` often prints its errors on stdout, see [`select_error`].
pub fn outcome_from_report(
    report: ProcessReport,
    timeout: Duration,
    capture_stdout: bool,
) -> StageRun {
    let ProcessReport { exit, elapsed, peak_memory_bytes } = report;
    match exit {
        ProcessExit::Exited { status, stdout, stderr } => {
            let error = select_error(status.success(), &stdout, &stderr);
            let outcome = StageOutcome::finished(status.code(), elapsed, error, stdout.len() as u64)
                .with_peak_memory(peak_memory_bytes);
            let stdout = (capture_stdout && !stdout.is_empty()).then_some(stdout);
            StageRun { outcome, stdout }
        }
        ProcessExit::TimedOut => StageRun {
            outcome: StageOutcome::timed_out(elapsed, timeout).with_peak_memory(peak_memory_bytes),
            stdout: None,
        },
        ProcessExit::Failed(error) => StageRun {
            outcome: StageOutcome::failed(elapsed, &error),
            stdout: None,
        },
    }
}

/// Drives `krt -b <module> <directive>`.
#[derive(Debug, Clone)]
pub struct KrtProver {
    toolchain: KrtToolchain,
}

impl KrtProver {
    pub fn new(toolchain: KrtToolchain) -> Self {
        KrtProver { toolchain }
    }
}

impl Prover for KrtProver {
    fn name(&self) -> &str {
        "krt"
    }

    fn run_stage(&self, invocation: &StageInvocation<'_>) -> StageRun {
        let module = self.toolchain.module(invocation.stage);
        let mut cmd = Command::new(&self.toolchain.krt);
        cmd.arg("-b").arg(module).arg(invocation.directive).current_dir(invocation.work_dir);
        debug!(
            stage = %invocation.stage,
            module = %module.display(),
            directive = %invocation.directive.display(),
            "spawning krt"
        );
        let report = run_bounded(cmd, invocation.timeout);
        outcome_from_report(report, invocation.timeout, invocation.capture_stdout)
    }
}
