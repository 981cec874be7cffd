//! Zip packaging of fetched content.
//!
//! Entries are addressed by their path relative to the destination root, so a
//! multi-file item keeps its top-level folder inside the archive. Output is
//! written to a temp file in the destination and renamed into place.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{FsOpsError, FsOpsResult};
use crate::validate::sanitize_relative;

const FALLBACK_NAME: &str = "download";
const ZIP_EXTENSION: &str = "zip";
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Which files go into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSelection {
    /// The whole item subtree `<destination>/<content name>`.
    Everything,
    /// Only these manifest-relative paths. Missing ones are skipped.
    Entries(Vec<String>),
}

/// Packaging request.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    /// Destination root the content was fetched into.
    pub destination: PathBuf,
    /// Display name reported by the engine.
    pub content_name: String,
    /// Caller-chosen archive name.
    pub name_override: Option<String>,
    /// Files to include.
    pub selection: ArchiveSelection,
}

/// Outcome of a packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Final archive path.
    pub path: PathBuf,
    /// Files written into the archive.
    pub entries_written: usize,
    /// Requested entries that were absent on disk.
    pub skipped: Vec<String>,
}

/// Archive base name (without extension).
///
/// The override wins when it is not blank. Whitespace runs collapse to `_`,
/// separators are replaced, leading dots are dropped and an empty result
/// falls back to `download`.
#[must_use]
pub fn archive_base_name(content_name: &str, name_override: Option<&str>) -> String {
    let source = name_override
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.strip_suffix(".zip").unwrap_or(name))
        .unwrap_or(content_name);
    let joined = source.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

impl ArchiveJob {
    /// Where the archive will be written.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        let base = archive_base_name(&self.content_name, self.name_override.as_deref());
        self.destination.join(format!("{base}.{ZIP_EXTENSION}"))
    }

    /// Build the archive on the current thread.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing could be collected or the archive cannot
    /// be written.
    pub fn run(&self) -> FsOpsResult<ArchiveReport> {
        let (sources, skipped) = self.collect_sources()?;
        if sources.is_empty() {
            return Err(FsOpsError::InvalidInput {
                field: "archive_selection",
                reason: "no files present to archive",
                value: Some(self.content_name.clone()),
            });
        }

        let output = self.output_path();
        let staging = NamedTempFile::new_in(&self.destination)
            .map_err(|err| FsOpsError::io("archive.stage", &self.destination, err))?;
        let mut writer = ZipWriter::new(staging);
        for (absolute, name) in &sources {
            append_file(&mut writer, absolute, name, &output)?;
        }
        let staging = writer
            .finish()
            .map_err(|err| FsOpsError::zip("archive.finish", &output, err))?;
        staging
            .persist(&output)
            .map_err(|err| FsOpsError::io("archive.persist", &output, err.error))?;

        debug!(path = %output.display(), entries = sources.len(), "archive written");
        Ok(ArchiveReport {
            path: output,
            entries_written: sources.len(),
            skipped,
        })
    }

    /// Build the archive on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveJob::run`], plus a join failure.
    pub async fn run_blocking(self) -> FsOpsResult<ArchiveReport> {
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|source| FsOpsError::Join {
                operation: "archive",
                source,
            })?
    }

    fn collect_sources(&self) -> FsOpsResult<(Vec<(PathBuf, String)>, Vec<String>)> {
        match &self.selection {
            ArchiveSelection::Everything => {
                let root = self.item_root()?;
                let sources = if root.is_file() {
                    vec![(root.clone(), self.entry_name(&root)?)]
                } else {
                    let mut sources = Vec::new();
                    for entry in WalkDir::new(&root).sort_by_file_name() {
                        let entry =
                            entry.map_err(|err| FsOpsError::walkdir("archive.walk", &root, err))?;
                        if entry.file_type().is_file() {
                            let path = entry.into_path();
                            let name = self.entry_name(&path)?;
                            sources.push((path, name));
                        }
                    }
                    sources
                };
                Ok((sources, Vec::new()))
            }
            ArchiveSelection::Entries(entries) => {
                let mut sources = Vec::new();
                let mut skipped = Vec::new();
                for relative in entries {
                    let Ok(clean) = sanitize_relative(relative) else {
                        warn!(entry = %relative, "unsafe archive entry skipped");
                        skipped.push(relative.clone());
                        continue;
                    };
                    let absolute = self.destination.join(&clean);
                    if absolute.is_file() {
                        sources.push((absolute, portable_name(&clean)));
                    } else {
                        warn!(entry = %relative, "selected file missing, skipped from archive");
                        skipped.push(relative.clone());
                    }
                }
                Ok((sources, skipped))
            }
        }
    }

    fn item_root(&self) -> FsOpsResult<PathBuf> {
        let clean =
            sanitize_relative(&self.content_name).map_err(|reason| FsOpsError::InvalidInput {
                field: "content_name",
                reason,
                value: Some(self.content_name.clone()),
            })?;
        let root = self.destination.join(clean);
        if root.exists() {
            Ok(root)
        } else {
            Err(FsOpsError::io(
                "archive.locate",
                &root,
                io::Error::new(io::ErrorKind::NotFound, "content not found"),
            ))
        }
    }

    fn entry_name(&self, path: &Path) -> FsOpsResult<String> {
        path.strip_prefix(&self.destination)
            .map(portable_name)
            .map_err(|_| FsOpsError::InvalidInput {
                field: "archive_entry",
                reason: "outside destination",
                value: Some(path.display().to_string()),
            })
    }
}

fn portable_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn append_file(
    writer: &mut ZipWriter<NamedTempFile>,
    absolute: &Path,
    name: &str,
    output: &Path,
) -> FsOpsResult<()> {
    let mut file =
        File::open(absolute).map_err(|err| FsOpsError::io("archive.open", absolute, err))?;
    let size = file
        .metadata()
        .map_err(|err| FsOpsError::io("archive.stat", absolute, err))?
        .len();
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(size >= LARGE_FILE_THRESHOLD);
    writer
        .start_file(name, options)
        .map_err(|err| FsOpsError::zip("archive.start_file", output, err))?;
    io::copy(&mut file, writer).map_err(|err| FsOpsError::io("archive.copy", absolute, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use zip::ZipArchive;

    fn names_in(path: &Path) -> anyhow::Result<Vec<String>> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut names = Vec::new();
        for index in 0..archive.len() {
            names.push(archive.by_index(index)?.name().to_string());
        }
        names.sort();
        Ok(names)
    }

    #[test]
    fn base_name_normalises_whitespace_and_separators() {
        assert_eq!(archive_base_name("My  Show\tS01", None), "My_Show_S01");
        assert_eq!(archive_base_name("a/b:c", None), "a_b_c");
        assert_eq!(archive_base_name("...", None), "download");
        assert_eq!(archive_base_name("Show", Some("  custom name.zip ")), "custom_name");
        assert_eq!(archive_base_name("Show", Some("   ")), "Show");
    }

    #[test]
    fn everything_archives_the_item_subtree() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let item = temp.path().join("My Show");
        fs::create_dir_all(item.join("extras"))?;
        fs::write(item.join("e01.mkv"), b"episode")?;
        fs::write(item.join("extras").join("notes.txt"), b"notes")?;
        fs::write(temp.path().join("unrelated.bin"), b"x")?;

        let report = ArchiveJob {
            destination: temp.path().to_path_buf(),
            content_name: "My Show".into(),
            name_override: None,
            selection: ArchiveSelection::Everything,
        }
        .run()?;

        assert_eq!(report.path, temp.path().join("My_Show.zip"));
        assert_eq!(report.entries_written, 2);
        assert_eq!(
            names_in(&report.path)?,
            vec!["My Show/e01.mkv", "My Show/extras/notes.txt"]
        );
        Ok(())
    }

    #[test]
    fn single_file_item_is_archived() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("movie.mkv"), b"film")?;
        let report = ArchiveJob {
            destination: temp.path().to_path_buf(),
            content_name: "movie.mkv".into(),
            name_override: Some("film".into()),
            selection: ArchiveSelection::Everything,
        }
        .run()?;
        assert_eq!(names_in(&report.path)?, vec!["movie.mkv"]);

        let mut archive = ZipArchive::new(File::open(&report.path)?)?;
        let mut body = String::new();
        archive.by_name("movie.mkv")?.read_to_string(&mut body)?;
        assert_eq!(body, "film");
        Ok(())
    }

    #[test]
    fn subset_skips_missing_entries() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        fs::create_dir_all(temp.path().join("pack"))?;
        fs::write(temp.path().join("pack/a.bin"), b"a")?;
        fs::write(temp.path().join("pack/c.bin"), b"c")?;

        let report = ArchiveJob {
            destination: temp.path().to_path_buf(),
            content_name: "pack".into(),
            name_override: None,
            selection: ArchiveSelection::Entries(vec![
                "pack/a.bin".into(),
                "pack/missing.bin".into(),
                "pack/c.bin".into(),
            ]),
        }
        .run()?;

        assert_eq!(report.entries_written, 2);
        assert_eq!(report.skipped, vec!["pack/missing.bin".to_string()]);
        assert_eq!(names_in(&report.path)?, vec!["pack/a.bin", "pack/c.bin"]);
        Ok(())
    }

    #[test]
    fn nothing_present_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let result = ArchiveJob {
            destination: temp.path().to_path_buf(),
            content_name: "pack".into(),
            name_override: None,
            selection: ArchiveSelection::Entries(vec!["pack/gone.bin".into()]),
        }
        .run();
        assert!(matches!(result, Err(FsOpsError::InvalidInput { .. })));
        assert!(!temp.path().join("pack.zip").exists());
        Ok(())
    }

    #[tokio::test]
    async fn blocking_variant_matches() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("one.txt"), b"1")?;
        let report = ArchiveJob {
            destination: temp.path().to_path_buf(),
            content_name: "one.txt".into(),
            name_override: None,
            selection: ArchiveSelection::Everything,
        }
        .run_blocking()
        .await?;
        assert_eq!(report.entries_written, 1);
        assert!(report.path.ends_with("one.txt.zip"));
        Ok(())
    }
}
