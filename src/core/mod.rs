//! Core types for trace-bench.
//!
//! This module contains the per-stage, per-file and per-batch records that every
//! other module produces or consumes.

pub mod env;
pub mod schema;

// Re-export key types for convenience
pub use env::EnvironmentInfo;
pub use schema::{BenchmarkRun, FileRun, Stage, StageOutcome, StageTotals, UNKNOWN_RESULT};
