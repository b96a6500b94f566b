//! `convert`: write the translated stage-1 directives without running anything.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::BenchConfig;
use crate::directive::{Translation, translate_goal};
use crate::engine::{discover_goals, ensure_unique_stems};
use crate::run_cmd::{input_directory, output_base};
use crate::storage::ArtifactPaths;
use crate::{BenchError, BenchResult};

pub const GOAL_DIR: &str = "goal";

/// Translate every input under `directory` into `<output>/goal/<stem>.goal`.
///
/// Returns the number of files converted.
pub fn convert_goals(directory: &Path, output: &Path, quiet: bool) -> BenchResult<usize> {
    let goal_dir = output.join(GOAL_DIR);
    fs::create_dir_all(&goal_dir).map_err(|e| BenchError::io("failed to create", &goal_dir, e))?;

    let inputs = discover_goals(directory, Some(&ArtifactPaths::new(output)))?;
    if inputs.is_empty() {
        return Err(BenchError::NoInputs(directory.to_path_buf()));
    }
    ensure_unique_stems(&inputs)?;
    if !quiet {
        println!("Found {} .but files", inputs.len());
        println!("Output: {}/", goal_dir.display());
        println!();
    }

    let mut count = 0;
    for input in &inputs {
        let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let content = fs::read_to_string(input).map_err(|e| BenchError::io("failed to read", input, e))?;
        let translation = translate_goal(&content, &format!("{stem}.trace"), &format!("{stem}.res"));
        if let Translation::Unchanged(_) = translation {
            warn!(file = %input.display(), "directive not recognised; copied unchanged");
        }
        let goal = goal_dir.join(format!("{stem}.goal"));
        fs::write(&goal, translation.text()).map_err(|e| BenchError::io("failed to write", &goal, e))?;
        count += 1;
        if !quiet {
            let name = input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            println!("Converted: {name} -> {GOAL_DIR}/{stem}.goal");
        }
    }
    Ok(count)
}

pub fn run(directory: PathBuf, output_dir: Option<PathBuf>, quiet: bool) -> BenchResult<()> {
    let directory = input_directory(&directory)?;
    let output = output_base(output_dir.as_deref(), &BenchConfig::default(), &directory)?;
    let count = convert_goals(&directory, &output, quiet)?;
    if !quiet {
        println!();
        println!("Converted {count} .but files to .goal files in {}/", output.join(GOAL_DIR).display());
    }
    Ok(())
}
