//! Triage of inputs that produced a trace but no replay.

pub mod analyze;
pub mod archive;
pub mod classify;

pub use analyze::{ANALYZE_TIMEOUT, TraceStats, analyze_failures, trace_stats};
pub use archive::archive_failures;
pub use classify::{
    EMPTY_ARTIFACT_THRESHOLD, FailureCategory, FailureRecord, FailureReport, classify,
};
