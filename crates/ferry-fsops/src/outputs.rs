//! Upload candidate discovery under the download root.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{FsOpsError, FsOpsResult};

/// One file that could be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    /// Absolute (or root-joined) path.
    pub path: PathBuf,
    /// Path relative to the listed root.
    pub relative: PathBuf,
    /// File size.
    pub size_bytes: u64,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Every non-hidden regular file below `root`, sorted by path.
///
/// Hidden directories are not descended into. A missing root yields an empty
/// list.
///
/// # Errors
///
/// Returns an error when traversal or metadata lookup fails.
pub fn list_outputs(root: &Path) -> FsOpsResult<Vec<OutputEntry>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut outputs = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
    {
        let entry = entry.map_err(|err| FsOpsError::walkdir("outputs.walk", root, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size_bytes = entry
            .metadata()
            .map_err(|err| FsOpsError::walkdir("outputs.metadata", entry.path(), err))?
            .len();
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_or_else(|_| entry.path().to_path_buf(), Path::to_path_buf);
        outputs.push(OutputEntry {
            path: entry.into_path(),
            relative,
            size_bytes,
        });
    }
    Ok(outputs)
}
