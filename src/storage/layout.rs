//! Output directory layout and suffix-based artifact routing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{BenchError, BenchResult};

pub const TRACE_DIR: &str = "trace";
pub const REPLAY_DIR: &str = "replay";
pub const FAILURES_DIR: &str = "replay-failures";
pub const MISC_DIR: &str = "misc";

/// The four output directories of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub base: PathBuf,
    pub trace: PathBuf,
    pub replay: PathBuf,
    pub replay_failures: PathBuf,
    pub misc: PathBuf,
}

/// Where [`ArtifactPaths::route`] left a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Moved(PathBuf),
    /// The suffix has no destination; the file was not touched.
    InPlace(PathBuf),
    /// There was no file to route.
    Missing,
}

impl ArtifactPaths {
    /// Compute the layout under `base` without touching the filesystem.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        ArtifactPaths {
            trace: base.join(TRACE_DIR),
            replay: base.join(REPLAY_DIR),
            replay_failures: base.join(FAILURES_DIR),
            misc: base.join(MISC_DIR),
            base,
        }
    }

    /// Compute the layout and create the directories. Existing directories are fine.
    pub fn create(base: impl Into<PathBuf>) -> BenchResult<Self> {
        let paths = Self::new(base);
        for dir in paths.dirs() {
            fs::create_dir_all(dir).map_err(|e| BenchError::io("failed to create", dir, e))?;
        }
        Ok(paths)
    }

    pub fn dirs(&self) -> [&Path; 4] {
        [&self.trace, &self.replay, &self.replay_failures, &self.misc]
    }

    /// True if `path` lives under one of the output directories.
    pub fn contains(&self, path: &Path) -> bool {
        self.dirs().iter().any(|d| path.starts_with(d))
    }

    pub fn trace_file(&self, stem: &str) -> PathBuf {
        self.trace.join(format!("{stem}.trace"))
    }

    /// Destination directory for `path`, decided by its suffix alone.
    pub fn destination_for(&self, path: &Path) -> Option<&Path> {
        match path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) {
            None => Some(&self.misc),
            Some(ext) if ext == "trace" => Some(&self.trace),
            Some(ext) if ext == "replay" => Some(&self.replay),
            Some(_) => None,
        }
    }

    /// Move `src` into the directory matching its suffix, keeping its file name.
    ///
    /// An existing file at the destination is replaced (and logged).
    pub fn route(&self, src: &Path) -> BenchResult<Routed> {
        if !src.exists() {
            return Ok(Routed::Missing);
        }
        let Some(dir) = self.destination_for(src) else {
            return Ok(Routed::InPlace(src.to_path_buf()));
        };
        let Some(name) = src.file_name() else {
            return Ok(Routed::InPlace(src.to_path_buf()));
        };
        let dest = dir.join(name);
        if dest.exists() {
            warn!(dest = %dest.display(), "replacing existing artifact");
        }
        move_file(src, &dest)?;
        debug!(from = %src.display(), to = %dest.display(), "routed artifact");
        Ok(Routed::Moved(dest))
    }

    /// Remove every file from the four directories; returns how many were removed.
    pub fn clean(&self) -> BenchResult<usize> {
        let mut count = 0;
        for dir in self.dirs() {
            count += clear_files(dir)?;
        }
        Ok(count)
    }
}

/// Remove the regular files directly inside `dir`. A missing directory counts as empty.
pub fn clear_files(dir: &Path) -> BenchResult<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BenchError::io("failed to list", dir, e)),
    };
    let mut count = 0;
    for entry in entries {
        let path = entry.map_err(|e| BenchError::io("failed to list", dir, e))?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| BenchError::io("failed to remove", &path, e))?;
            count += 1;
        }
    }
    Ok(count)
}

/// Remove `path` if it exists. A missing file is not an error.
pub fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove transient file"),
    }
}

fn move_file(src: &Path, dest: &Path) -> BenchResult<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    // rename cannot cross filesystems
    fs::copy(src, dest).map_err(|e| BenchError::io("failed to move", src, e))?;
    fs::remove_file(src).map_err(|e| BenchError::io("failed to remove", src, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let a = ArtifactPaths::create(dir.path()).unwrap();
        let b = ArtifactPaths::create(dir.path()).unwrap();
        assert_eq!(a, b);
        for d in a.dirs() {
            assert!(d.is_dir());
        }
    }

    #[test]
    fn test_routing_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::create(dir.path().join("out")).unwrap();
        for name in ["a.trace", "b.replay", "c", "d.res", "E.TRACE"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let moved = |name: &str| paths.route(&dir.path().join(name)).unwrap();
        assert_eq!(moved("a.trace"), Routed::Moved(paths.trace.join("a.trace")));
        assert_eq!(moved("b.replay"), Routed::Moved(paths.replay.join("b.replay")));
        assert_eq!(moved("c"), Routed::Moved(paths.misc.join("c")));
        assert_eq!(moved("d.res"), Routed::InPlace(dir.path().join("d.res")));
        assert_eq!(moved("E.TRACE"), Routed::Moved(paths.trace.join("E.TRACE")));

        assert!(paths.trace.join("a.trace").is_file());
        assert!(!dir.path().join("a.trace").exists());
        assert!(dir.path().join("d.res").is_file());
    }

    #[test]
    fn test_route_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::create(dir.path()).unwrap();
        assert_eq!(paths.route(&dir.path().join("nope.trace")).unwrap(), Routed::Missing);
    }

    #[test]
    fn test_route_replaces_stale_destination() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::create(dir.path()).unwrap();
        fs::write(paths.trace.join("g.trace"), "old").unwrap();
        fs::write(dir.path().join("g.trace"), "new").unwrap();
        paths.route(&dir.path().join("g.trace")).unwrap();
        assert_eq!(fs::read_to_string(paths.trace.join("g.trace")).unwrap(), "new");
    }

    #[test]
    fn test_clean_removes_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::create(dir.path()).unwrap();
        fs::write(paths.trace.join("a.trace"), "x").unwrap();
        fs::write(paths.misc.join("b"), "x").unwrap();
        fs::create_dir(paths.misc.join("keep")).unwrap();
        assert_eq!(paths.clean().unwrap(), 2);
        assert!(paths.misc.join("keep").is_dir());
        assert_eq!(paths.clean().unwrap(), 0);
    }

    #[test]
    fn test_contains() {
        let paths = ArtifactPaths::new("/out");
        assert!(paths.contains(Path::new("/out/trace/a.but")));
        assert!(!paths.contains(Path::new("/out/goals/a.but")));
    }
}
