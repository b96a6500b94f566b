//! On-disk output: the artifact directory layout and tabular export.

pub mod csv;
pub mod layout;

pub use csv::{CSV_HEADERS, CsvExporter};
pub use layout::{ArtifactPaths, Routed};
