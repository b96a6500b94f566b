//! Discovery of proof-goal input files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::ArtifactPaths;
use crate::{BenchError, BenchResult};

/// Suffix of proof-goal inputs.
pub const GOAL_EXTENSION: &str = "but";

/// All `*.but` files under `root`, recursively, sorted by path.
///
/// Files inside the output directories of `exclude` are skipped, so archived
/// copies in `replay-failures/` are never benchmarked again. Symlinked
/// directories are not followed.
pub fn discover_goals(root: &Path, exclude: Option<&ArtifactPaths>) -> BenchResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| BenchError::io("failed to list", &dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BenchError::io("failed to list", &dir, e))?;
            let path = entry.path();
            if exclude.is_some_and(|paths| paths.contains(&path)) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| BenchError::io("failed to stat", &path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == GOAL_EXTENSION) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Fail if two inputs have the same file stem.
///
/// Routed artifacts and failure bundles are named by stem alone, so `a/x.but`
/// and `b/x.but` would overwrite each other's trace and archive entry.
pub fn ensure_unique_stems(inputs: &[PathBuf]) -> BenchResult<()> {
    let mut seen: HashMap<&std::ffi::OsStr, &Path> = HashMap::new();
    for input in inputs {
        let Some(stem) = input.file_stem() else { continue };
        if let Some(first) = seen.insert(stem, input) {
            return Err(BenchError::DuplicateStem {
                stem: stem.to_string_lossy().into_owned(),
                first: first.to_path_buf(),
                second: input.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        for name in ["b.but", "a.but", "sub/c.but", "sub/deeper/d.but", "notes.txt", "sub/e.goal"] {
            fs::write(root.join(name), "P").unwrap();
        }
        let found = discover_goals(root, None).unwrap();
        let rel: Vec<_> = found.iter().map(|p| p.strip_prefix(root).unwrap().to_path_buf()).collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.but"),
                PathBuf::from("b.but"),
                PathBuf::from("sub/c.but"),
                PathBuf::from("sub/deeper/d.but"),
            ]
        );
    }

    #[test]
    fn test_same_stem_in_two_directories_is_rejected() {
        let inputs = vec![PathBuf::from("a/x.but"), PathBuf::from("b/y.but"), PathBuf::from("b/x.but")];
        match ensure_unique_stems(&inputs).unwrap_err() {
            BenchError::DuplicateStem { stem, first, second } => {
                assert_eq!(stem, "x");
                assert_eq!(first, PathBuf::from("a/x.but"));
                assert_eq!(second, PathBuf::from("b/x.but"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ensure_unique_stems(&inputs[..2]).is_ok());
    }

    #[test]
    fn test_skips_output_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::create(dir.path()).unwrap();
        fs::write(dir.path().join("g1.but"), "P").unwrap();
        fs::write(paths.replay_failures.join("g1.but"), "P").unwrap();
        let found = discover_goals(dir.path(), Some(&paths)).unwrap();
        assert_eq!(found, vec![dir.path().join("g1.but")]);
    }
}
