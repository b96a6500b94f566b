//! Location of the external tools: the `krt` kernel runtime and the PP / REPLAY bytecodes.
//!
//! Resolution happens once, at startup; the resulting [`KrtToolchain`] is passed
//! down to the prover rather than looked up again per file.

use std::path::{Path, PathBuf};

use crate::core::Stage;
use crate::{BenchError, BenchResult};

const ATELIER_BIN: &str = "/opt/atelierb-free-24.04.2/bin";

/// Resolved tool locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrtToolchain {
    /// Path to the krt binary
    pub krt: PathBuf,
    /// PP.kin bytecode, run for the proving stage
    pub prove_module: PathBuf,
    /// REPLAY.kin bytecode, run for the replay stage
    pub replay_module: PathBuf,
}

impl KrtToolchain {
    pub fn new(
        krt: impl Into<PathBuf>,
        prove_module: impl Into<PathBuf>,
        replay_module: impl Into<PathBuf>,
    ) -> Self {
        KrtToolchain {
            krt: krt.into(),
            prove_module: prove_module.into(),
            replay_module: replay_module.into(),
        }
    }

    /// Bytecode module for `stage`.
    pub fn module(&self, stage: Stage) -> &Path {
        match stage {
            Stage::Prove => &self.prove_module,
            Stage::Replay => &self.replay_module,
        }
    }
}

/// Explicit tool paths (CLI flags or config file); `None` means "search".
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub krt: Option<PathBuf>,
    pub prove_module: Option<PathBuf>,
    pub replay_module: Option<PathBuf>,
}

impl ToolOverrides {
    /// Resolve all three tools; any missing one is fatal.
    pub fn resolve(&self) -> BenchResult<KrtToolchain> {
        let krt = self.resolve_krt()?;
        let prove_module = self.resolve_prove_module()?;
        let replay_module = self.resolve_replay_module()?;
        Ok(KrtToolchain { krt, prove_module, replay_module })
    }

    /// Resolve only what the replay stage needs. The prove module is left as given (or empty).
    pub fn resolve_for_replay(&self) -> BenchResult<KrtToolchain> {
        let krt = self.resolve_krt()?;
        let replay_module = self.resolve_replay_module()?;
        let prove_module = self
            .prove_module
            .clone()
            .or_else(find_prove_module)
            .unwrap_or_default();
        Ok(KrtToolchain { krt, prove_module, replay_module })
    }

    fn resolve_krt(&self) -> BenchResult<PathBuf> {
        self.krt
            .clone()
            .or_else(find_krt)
            .ok_or(BenchError::ToolNotFound { tool: "krt", flag: "--krt" })
    }

    fn resolve_prove_module(&self) -> BenchResult<PathBuf> {
        self.prove_module
            .clone()
            .or_else(find_prove_module)
            .ok_or(BenchError::ToolNotFound { tool: "PP.kin", flag: "--pp-kin" })
    }

    fn resolve_replay_module(&self) -> BenchResult<PathBuf> {
        self.replay_module
            .clone()
            .or_else(find_replay_module)
            .ok_or(BenchError::ToolNotFound { tool: "REPLAY.kin", flag: "--replay-kin" })
    }
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.is_file())
}

/// Search every directory of `path_var` (a `PATH`-style list) for `name`.
pub fn search_path(name: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    first_existing(std::env::split_paths(path_var).map(|dir| dir.join(name)))
}

/// `krt` from `PATH`, then the usual install locations.
pub fn find_krt() -> Option<PathBuf> {
    search_path("krt", std::env::var_os("PATH").as_deref()).or_else(|| {
        first_existing([Path::new(ATELIER_BIN).join("krt"), PathBuf::from("/usr/local/bin/krt")])
    })
}

pub fn find_prove_module() -> Option<PathBuf> {
    let mut candidates = vec![Path::new(ATELIER_BIN).join("PP.kin")];
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(Path::new(&home).join("atelierb/bin/PP.kin"));
    }
    first_existing(candidates)
}

pub fn find_replay_module() -> Option<PathBuf> {
    first_existing([
        PathBuf::from("atelierb/tools/linux_x64/REPLAY.kin"),
        PathBuf::from("atelierb/tools/macosx/REPLAY.kin"),
        Path::new(ATELIER_BIN).join("REPLAY.kin"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_per_stage() {
        let t = KrtToolchain::new("krt", "PP.kin", "REPLAY.kin");
        assert_eq!(t.module(Stage::Prove), Path::new("PP.kin"));
        assert_eq!(t.module(Stage::Replay), Path::new("REPLAY.kin"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let overrides = ToolOverrides {
            krt: Some("/x/krt".into()),
            prove_module: Some("/x/PP.kin".into()),
            replay_module: Some("/x/REPLAY.kin".into()),
        };
        let t = overrides.resolve().unwrap();
        assert_eq!(t, KrtToolchain::new("/x/krt", "/x/PP.kin", "/x/REPLAY.kin"));
    }

    #[test]
    fn test_search_path_finds_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("krt"), "#!/bin/sh\n").unwrap();
        let joined = std::env::join_paths(["/nonexistent-dir", dir.path().to_str().unwrap()]).unwrap();
        assert_eq!(search_path("krt", Some(&joined)), Some(dir.path().join("krt")));
        assert_eq!(search_path("krt", None), None);
        assert_eq!(search_path("other", Some(&joined)), None);
    }
}
