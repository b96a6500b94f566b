//! CSV export of per-file results.

use std::io::Write;
use std::path::Path;

use crate::core::{FileRun, StageOutcome};
use crate::{BenchError, BenchResult};

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &[
    "filename",
    "result",
    "pp_success",
    "pp_timeout",
    "pp_time_s",
    "pp_output_size",
    "pp_exit_code",
    "pp_peak_rss_mb",
    "pp_error",
    "replay_success",
    "replay_timeout",
    "replay_time_s",
    "replay_output_size",
    "replay_exit_code",
    "replay_peak_rss_mb",
    "replay_error",
    "total_time_s",
    "input_sha256",
];

/// Flat, one-row-per-file export. Stages that never ran leave their columns empty.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        CsvExporter
    }

    /// Export to a file, creating its parent directory if needed.
    pub fn export(&self, files: &[FileRun], output: &Path) -> BenchResult<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::io("failed to create", parent, e))?;
            }
        }
        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::io("failed to create", output, e))?;
        self.export_to_writer(files, file)
    }

    pub fn export_to_writer<W: Write>(&self, files: &[FileRun], writer: W) -> BenchResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;
        for file in files {
            csv_writer
                .write_record(self.row(file))
                .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
        }
        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;
        Ok(())
    }

    fn row(&self, file: &FileRun) -> Vec<String> {
        let mut row = vec![file.source_name.clone(), file.result_label.clone()];
        row.extend(stage_columns(file.stage1.as_ref()));
        row.extend(stage_columns(file.stage2.as_ref()));
        row.push(format!("{:.3}", file.total_time()));
        row.push(file.input_sha256.clone().unwrap_or_default());
        row
    }
}

fn stage_columns(outcome: Option<&StageOutcome>) -> [String; 7] {
    let Some(o) = outcome else {
        return Default::default();
    };
    [
        o.succeeded.to_string(),
        o.timed_out.to_string(),
        format!("{:.3}", o.elapsed_seconds),
        o.output_size_bytes.to_string(),
        o.exit_code.map(|c| c.to_string()).unwrap_or_default(),
        o.peak_memory_bytes
            .map(|b| format!("{:.1}", b as f64 / (1024.0 * 1024.0)))
            .unwrap_or_default(),
        o.error_message.clone().unwrap_or_default(),
    ]
}
