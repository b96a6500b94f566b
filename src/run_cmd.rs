//! `run`: benchmark every goal of a directory through PP then REPLAY.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::backend::{KrtProver, Prover};
use crate::config::{BenchConfig, load_config};
use crate::core::{BenchmarkRun, EnvironmentInfo, FileRun};
use crate::engine::{
    KrtToolchain, Pipeline, PipelineConfig, ToolOverrides, discover_goals, ensure_unique_stems,
};
use crate::report::{BenchReport, progress_line, write_failure_analysis, write_summary};
use crate::storage::{ArtifactPaths, CsvExporter};
use crate::triage::{FailureReport, archive_failures};
use crate::{BenchError, BenchResult};

/// Command-line options of `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub directory: PathBuf,
    pub tools: ToolOverrides,
    /// `-t`: one timeout for both stages
    pub timeout: Option<f64>,
    pub pp_timeout: Option<f64>,
    pub replay_timeout: Option<f64>,
    pub output_dir: Option<PathBuf>,
    pub clean: bool,
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub quiet: bool,
    pub verbose: bool,
    pub config: Option<PathBuf>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutput {
    pub batch: BenchmarkRun,
    pub failures: FailureReport,
    pub paths: ArtifactPaths,
}

pub(crate) fn read_config(path: Option<&Path>) -> BenchResult<BenchConfig> {
    path.map(load_config).transpose().map(Option::unwrap_or_default)
}

pub(crate) fn input_directory(dir: &Path) -> BenchResult<PathBuf> {
    std::fs::canonicalize(dir).map_err(|e| BenchError::io("failed to open", dir, e))
}

pub(crate) fn output_base(cli: Option<&Path>, config: &BenchConfig, input_dir: &Path) -> BenchResult<PathBuf> {
    let base = config.output_dir(cli).unwrap_or_else(|| input_dir.to_path_buf());
    std::path::absolute(&base).map_err(|e| BenchError::io("failed to resolve", &base, e))
}

fn stdout_error(e: std::io::Error) -> BenchError {
    BenchError::io("failed to write", "<stdout>", e)
}

pub fn run(opts: RunOptions) -> BenchResult<()> {
    let config = read_config(opts.config.as_deref())?;
    let toolchain = config.tool_overrides(&opts.tools).resolve()?;
    let prover = KrtProver::new(toolchain.clone());
    run_with_prover(&opts, &config, &prover, Some(&toolchain)).map(|_| ())
}

/// The body of `run`, with the prover supplied by the caller.
pub fn run_with_prover(
    opts: &RunOptions,
    config: &BenchConfig,
    prover: &dyn Prover,
    toolchain: Option<&KrtToolchain>,
) -> BenchResult<RunOutput> {
    let directory = input_directory(&opts.directory)?;
    let base = output_base(opts.output_dir.as_deref(), config, &directory)?;
    let (pp_timeout, replay_timeout) = config.timeouts(opts.timeout, opts.pp_timeout, opts.replay_timeout)?;
    let threshold = config.empty_artifact_threshold();
    let pipeline_config = PipelineConfig {
        min_replay_output_chars: config.min_replay_output_chars(),
        ..PipelineConfig::default()
    }
    .with_timeouts(pp_timeout, replay_timeout)
    .with_jobs(config.jobs(opts.jobs));

    let stdout = std::io::stdout();
    if !opts.quiet {
        let mut out = stdout.lock();
        if let Some(t) = toolchain {
            writeln!(out, "Using krt: {}", t.krt.display()).map_err(stdout_error)?;
            writeln!(out, "Using PP.kin: {}", t.prove_module.display()).map_err(stdout_error)?;
            writeln!(out, "Using REPLAY.kin: {}", t.replay_module.display()).map_err(stdout_error)?;
        }
        writeln!(
            out,
            "Timeouts: PP={:?}s, REPLAY={:?}s",
            pp_timeout.as_secs_f64(),
            replay_timeout.as_secs_f64()
        )
        .map_err(stdout_error)?;
        writeln!(out, "Output: {}/", base.display()).map_err(stdout_error)?;
        writeln!(out).map_err(stdout_error)?;
    }

    let paths = ArtifactPaths::create(&base)?;
    if opts.clean {
        let removed = paths.clean()?;
        info!(removed, "cleaned output directories");
        if !opts.quiet && removed > 0 {
            println!("Cleaned up {removed} old output files");
        }
    }

    let inputs = discover_goals(&directory, Some(&paths))?;
    if inputs.is_empty() {
        return Err(BenchError::NoInputs(directory));
    }
    ensure_unique_stems(&inputs)?;
    if !opts.quiet {
        println!("Found {} .but files", inputs.len());
        println!();
    }
    info!(files = inputs.len(), jobs = pipeline_config.jobs, "starting benchmark");

    let pipeline = Pipeline::new(prover, &paths, pipeline_config);
    let quiet = opts.quiet;
    let on_file = |file: &FileRun| {
        if !quiet {
            let rel = file.source_path.strip_prefix(&directory).unwrap_or(&file.source_path);
            println!("{}: {}", rel.display(), progress_line(file));
        }
    };
    let batch = pipeline.run_batch(&inputs, on_file)?;

    let failures = archive_failures(&batch, &paths, threshold)?;
    {
        let mut out = stdout.lock();
        write_summary(&mut out, &batch, &paths).map_err(stdout_error)?;
        write_failure_analysis(&mut out, &failures, &paths, toolchain, threshold, opts.verbose)
            .map_err(stdout_error)?;
    }

    if let Some(json) = &opts.json {
        let environment = match toolchain {
            Some(t) => EnvironmentInfo::detect(&directory, t),
            None => EnvironmentInfo::default(),
        };
        BenchReport::build(&batch, &failures, Some(environment)).write(json)?;
        println!("Detailed results written to: {}", json.display());
    }
    if let Some(csv) = &opts.csv {
        CsvExporter::new().export(&batch.files, csv)?;
        println!("CSV results written to: {}", csv.display());
    }

    Ok(RunOutput { batch, failures, paths })
}
