//! Manifest path validation.

use std::path::{Component, Path, PathBuf};

use ferry_torrent_core::{FileManifestEntry, ManifestViolation};

/// Normalise a manifest-relative path, rejecting anything that could escape
/// the destination root.
///
/// Both `/` and `\` are treated as separators so a manifest authored on
/// another platform cannot smuggle a parent reference past the check.
///
/// # Errors
///
/// Returns the name of the violated rule.
pub fn sanitize_relative(path: &str) -> Result<PathBuf, &'static str> {
    if path.trim().is_empty() {
        return Err("empty path");
    }
    if path.contains('\0') {
        return Err("nul byte in path");
    }
    if path.starts_with(['/', '\\']) || Path::new(path).is_absolute() {
        return Err("absolute path");
    }
    if has_drive_prefix(path) {
        return Err("drive prefix");
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err("parent directory component");
    }

    let mut sanitized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => return Err("parent directory component"),
            Component::RootDir | Component::Prefix(_) => return Err("absolute path"),
        }
    }
    if sanitized.as_os_str().is_empty() {
        return Err("empty path");
    }
    Ok(sanitized)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Check every entry, collecting all violations rather than stopping at the first.
///
/// # Errors
///
/// Returns one [`ManifestViolation`] per offending entry.
pub fn validate_manifest(entries: &[FileManifestEntry]) -> Result<(), Vec<ManifestViolation>> {
    let violations: Vec<ManifestViolation> = entries
        .iter()
        .filter_map(|entry| {
            sanitize_relative(&entry.relative_path)
                .err()
                .map(|reason| ManifestViolation {
                    index: entry.index,
                    relative_path: entry.relative_path.clone(),
                    reason: reason.to_string(),
                })
        })
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u32, path: &str) -> FileManifestEntry {
        FileManifestEntry {
            index,
            relative_path: path.to_string(),
            size_bytes: 1,
        }
    }

    #[test]
    fn sanitize_normalises_current_dir_segments() {
        assert_eq!(
            sanitize_relative("show/./s01/e01.mkv"),
            Ok(PathBuf::from("show/s01/e01.mkv"))
        );
    }

    #[test]
    fn sanitize_rejects_escapes() {
        for (path, reason) in [
            ("", "empty path"),
            ("./", "empty path"),
            ("/etc/passwd", "absolute path"),
            ("\\windows\\system32", "absolute path"),
            ("C:evil", "drive prefix"),
            ("../escape", "parent directory component"),
            ("show/../../escape", "parent directory component"),
            ("show\\..\\..\\escape", "parent directory component"),
            ("bad\0name", "nul byte in path"),
        ] {
            assert_eq!(sanitize_relative(path), Err(reason), "{path:?}");
        }
    }

    #[test]
    fn every_violation_is_reported() {
        let entries = vec![
            entry(0, "../a"),
            entry(1, "ok/file.bin"),
            entry(2, "/abs"),
            entry(3, "nested/../../b"),
        ];
        let violations = validate_manifest(&entries).expect_err("violations expected");
        let indices: Vec<u32> = violations.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, 2, 3]);
    }

    #[test]
    fn clean_manifest_passes() {
        let entries = vec![entry(0, "show/a.mkv"), entry(1, "show/sub/b.srt")];
        assert!(validate_manifest(&entries).is_ok());
    }
}
