//! `analyze`: re-run the archived replay failures of a previous run.

use std::path::PathBuf;

use tracing::info;

use crate::engine::ToolOverrides;
use crate::report::write_failure_analysis;
use crate::run_cmd::{input_directory, output_base, read_config};
use crate::storage::ArtifactPaths;
use crate::triage::{ANALYZE_TIMEOUT, analyze::archived_goals, analyze_failures};
use crate::{BenchError, BenchResult};

pub fn run(
    directory: PathBuf,
    tools: ToolOverrides,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> BenchResult<()> {
    let config = read_config(config.as_deref())?;
    let toolchain = config.tool_overrides(&tools).resolve_for_replay()?;
    let directory = input_directory(&directory)?;
    let paths = ArtifactPaths::new(output_base(output_dir.as_deref(), &config, &directory)?);
    let archive = &paths.replay_failures;

    if !archive.is_dir() {
        println!("No replay-failures directory found.");
        return Ok(());
    }
    let goals = archived_goals(archive)?;
    if goals.is_empty() {
        println!("No .replay.goal files found in replay-failures/");
        return Ok(());
    }
    println!("Analyzing {} cases in {}/", goals.len(), archive.display());
    info!(cases = goals.len(), "reanalysing archived failures");

    let threshold = config.empty_artifact_threshold();
    let failures = analyze_failures(&toolchain, archive, threshold, ANALYZE_TIMEOUT)?;
    let mut out = std::io::stdout().lock();
    write_failure_analysis(&mut out, &failures, &paths, Some(&toolchain), threshold, true)
        .map_err(|e| BenchError::io("failed to write", "<stdout>", e))
}
