//! Host and toolchain information attached to benchmark reports.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::engine::KrtToolchain;

/// Environment information for benchmark reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ram_bytes: Option<u64>,

    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Commit of the goal corpus, when the input directory is a git checkout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_git_sha: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub krt_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prove_module: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_module: Option<String>,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        EnvironmentInfo {
            cpu_model: None,
            cpu_cores: None,
            total_ram_bytes: None,
            os: std::env::consts::OS.to_string(),
            hostname: None,
            corpus_git_sha: None,
            krt_path: None,
            prove_module: None,
            replay_module: None,
        }
    }
}

impl EnvironmentInfo {
    /// Detect host information and record which tools drove the run.
    pub fn detect(corpus_dir: &Path, toolchain: &KrtToolchain) -> Self {
        use sysinfo::System;

        let mut sys = System::new_all();
        sys.refresh_all();

        EnvironmentInfo {
            cpu_model: sys.cpus().first().map(|c| c.brand().to_string()),
            cpu_cores: sys.physical_core_count().map(|c| c as u32),
            total_ram_bytes: Some(sys.total_memory()),
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            hostname: System::host_name(),
            corpus_git_sha: detect_git_sha(corpus_dir),
            krt_path: Some(toolchain.krt.display().to_string()),
            prove_module: Some(toolchain.prove_module.display().to_string()),
            replay_module: Some(toolchain.replay_module.display().to_string()),
        }
    }
}

/// `git rev-parse HEAD` inside `dir`
fn detect_git_sha(dir: &Path) -> Option<String> {
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detect_records_tools() {
        let toolchain = KrtToolchain::new("/bin/krt", "/opt/PP.kin", "/opt/REPLAY.kin");
        let dir = std::env::temp_dir();
        let env = EnvironmentInfo::detect(&dir, &toolchain);
        assert!(!env.os.is_empty());
        assert_eq!(env.krt_path.as_deref(), Some("/bin/krt"));
        assert_eq!(env.replay_module.as_deref(), Some("/opt/REPLAY.kin"));
    }

    #[test]
    fn test_environment_default() {
        let env = EnvironmentInfo::default();
        assert!(!env.os.is_empty());
        assert!(env.cpu_model.is_none());
        assert!(env.krt_path.is_none());
    }
}
