//! Utilities for enumerating files beneath a directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use glob::Pattern;
use tracing::warn;

/// Returns every path matching `pattern` relative to `dir`, sorted
/// lexicographically. `dir` is escaped so that glob metacharacters in the
/// directory name itself are matched literally. Entries that cannot be read
/// are logged and skipped.
///
/// ```
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("b.txt"), "").unwrap();
/// std::fs::write(dir.path().join("a.txt"), "").unwrap();
///
/// let found = editbatch::utils::walk::glob_sorted(dir.path(), "*.txt").unwrap();
/// assert_eq!(found, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
/// ```
pub fn glob_sorted(dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        Pattern::escape(&dir.to_string_lossy()),
        pattern
    );

    let mut paths = Vec::new();
    for entry in glob::glob(&full).with_context(|| format!("invalid glob pattern: {}", full))? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("skipping unreadable path {}: {}", e.path().display(), e.error()),
        }
    }

    paths.sort();
    Ok(paths)
}

/// Returns the immediate subdirectories of `dir`, sorted by name. A missing
/// directory yields an empty list.
pub fn subdirectories(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// The final component of a path as an owned string (lossy for non-UTF-8
/// names).
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
