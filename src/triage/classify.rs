//! Failure taxonomy for inputs whose trace was produced but never replayed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::analyze::TraceStats;

/// Traces at or below this many bytes are treated as empty.
pub const EMPTY_ARTIFACT_THRESHOLD: u64 = 10;

const STACK_OVERFLOW_MARKER: &str = "GOALS STACK OVERFLOW";
const PARSE_ERROR_MARKER: &str = "missing atomic symbol";
const TIMEOUT_MARKER: &str = "Timeout";

/// Why a replay failed. The declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    StackOverflow,
    EmptyArtifact,
    ParseError,
    Timeout,
    NoOutput,
    Other,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 6] = [
        FailureCategory::StackOverflow,
        FailureCategory::EmptyArtifact,
        FailureCategory::ParseError,
        FailureCategory::Timeout,
        FailureCategory::NoOutput,
        FailureCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::StackOverflow => "STACK_OVERFLOW",
            FailureCategory::EmptyArtifact => "EMPTY_ARTIFACT",
            FailureCategory::ParseError => "PARSE_ERROR",
            FailureCategory::Timeout => "TIMEOUT",
            FailureCategory::NoOutput => "NO_OUTPUT",
            FailureCategory::Other => "OTHER",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FailureCategory::StackOverflow => "REPLAY stack overflow (proof too deep/complex)",
            FailureCategory::EmptyArtifact => "Empty trace (PP did not complete proof)",
            FailureCategory::ParseError => "Trace parse error (malformed trace)",
            FailureCategory::Timeout => "REPLAY timeout",
            FailureCategory::NoOutput => "No output from REPLAY",
            FailureCategory::Other => "Other errors",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a replay failure. The first matching rule wins:
/// no error text splits on the artifact size, then the error markers are
/// checked in a fixed order.
pub fn classify(error: Option<&str>, artifact_size: u64, threshold: u64) -> FailureCategory {
    let error = error.filter(|e| !e.trim().is_empty());
    match error {
        None if artifact_size <= threshold => FailureCategory::EmptyArtifact,
        None => FailureCategory::NoOutput,
        Some(e) if e.contains(STACK_OVERFLOW_MARKER) => FailureCategory::StackOverflow,
        Some(e) if e.contains(PARSE_ERROR_MARKER) => FailureCategory::ParseError,
        Some(e) if e.contains(TIMEOUT_MARKER) => FailureCategory::Timeout,
        Some(_) => FailureCategory::Other,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub identifier: String,
    pub artifact_size_bytes: u64,
    pub raw_error: Option<String>,
    pub category: FailureCategory,
    /// Only filled in by the analyze mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_stats: Option<TraceStats>,
}

/// Failures grouped by category, each group in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FailureReport {
    groups: BTreeMap<FailureCategory, Vec<FailureRecord>>,
}

impl FailureReport {
    pub fn push(&mut self, record: FailureRecord) {
        self.groups.entry(record.category).or_default().push(record);
    }

    pub fn get(&self, category: FailureCategory) -> &[FailureRecord] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Non-empty groups in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (FailureCategory, &[FailureRecord])> {
        self.groups.iter().map(|(c, records)| (*c, records.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
