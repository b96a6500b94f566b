//! Reproduction bundles for replay failures.
//!
//! Each bundle in `replay-failures/` is the input file, its trace, and a
//! `<stem>.replay.goal` that references the trace by relative name, so the
//! failure can be re-run from inside that directory.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::{BenchmarkRun, FileRun, Stage};
use crate::directive::replay_directive;
use crate::storage::ArtifactPaths;
use crate::storage::layout::clear_files;
use crate::{BenchError, BenchResult};

use super::classify::{FailureRecord, FailureReport, classify};

/// Classify every replay failure of `run` and archive it.
///
/// The archive directory is emptied once, before anything is copied. Inputs
/// whose trace is no longer in `trace/` are skipped.
pub fn archive_failures(
    run: &BenchmarkRun,
    paths: &ArtifactPaths,
    threshold: u64,
) -> BenchResult<FailureReport> {
    let archive = &paths.replay_failures;
    fs::create_dir_all(archive).map_err(|e| BenchError::io("failed to create", archive, e))?;
    let removed = clear_files(archive)?;
    debug!(removed, "cleared failure archive");

    let mut report = FailureReport::default();
    for file in run.replay_failures() {
        let stem = file.stem();
        let trace = paths.trace_file(&stem);
        let Ok(meta) = fs::metadata(&trace) else {
            debug!(file = %file.source_name, "no routed trace, not archived");
            continue;
        };
        let size = meta.len();
        let error = file.outcome(Stage::Replay).and_then(|o| o.error_message.clone());
        let category = classify(error.as_deref(), size, threshold);

        if let Err(e) = write_bundle(file, &stem, &trace, archive) {
            warn!(file = %file.source_name, error = %e, "incomplete failure bundle");
        }
        report.push(FailureRecord {
            identifier: stem,
            artifact_size_bytes: size,
            raw_error: error,
            category,
            trace_stats: None,
        });
    }
    info!(failures = report.total(), archive = %archive.display(), "archived replay failures");
    Ok(report)
}

fn write_bundle(file: &FileRun, stem: &str, trace: &Path, archive: &Path) -> BenchResult<()> {
    if file.source_path.is_file() {
        let dest = archive.join(&file.source_name);
        fs::copy(&file.source_path, &dest)
            .map_err(|e| BenchError::io("failed to copy", &file.source_path, e))?;
    }
    let trace_name = format!("{stem}.trace");
    fs::copy(trace, archive.join(&trace_name)).map_err(|e| BenchError::io("failed to copy", trace, e))?;
    let goal = archive.join(format!("{stem}.replay.goal"));
    let directive = replay_directive(&trace_name, &format!("{stem}.replay.res"));
    fs::write(&goal, directive).map_err(|e| BenchError::io("failed to write", &goal, e))?;
    Ok(())
}
