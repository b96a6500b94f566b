//! Reporting: the JSON report written by `--json` and the console summary.

pub mod json;
pub mod summary;

pub use json::{BenchReport, FailureEntry, FileEntry, ReportSummary, StageSummary};
pub use summary::{
    format_time, group_thousands, progress_line, repro_command, write_failure_analysis,
    write_summary,
};
