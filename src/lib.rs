pub mod analyze_cmd;
pub mod backend;
pub mod config;
pub mod convert_cmd;
pub mod core;
pub mod directive;
pub mod engine;
pub mod report;
pub mod run_cmd;
pub mod storage;
pub mod triage;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Maximum number of characters kept from any captured error text.
pub const MAX_ERROR_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{0}")]
    Message(String),
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} not found. Use {flag} to specify path.")]
    ToolNotFound { tool: &'static str, flag: &'static str },
    #[error("no .but files found in {}", .0.display())]
    NoInputs(PathBuf),
    #[error("{} and {} would share trace/{stem}.trace; rename one of them", .first.display(), .second.display())]
    DuplicateStem { stem: String, first: PathBuf, second: PathBuf },
    #[error("invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BenchError {
    /// Wrap an I/O error with the operation and the path it concerned.
    pub fn io(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        BenchError::Io { action, path: path.as_ref().to_path_buf(), source }
    }
}

pub type BenchResult<T> = Result<T, BenchError>;

/// Trim `text` and keep at most `MAX_ERROR_CHARS` characters of it.
pub fn truncate_error(text: &str) -> String {
    text.trim().chars().take(MAX_ERROR_CHARS).collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha256::digest;
    digest(bytes)
}
