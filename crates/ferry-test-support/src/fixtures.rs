//! Descriptor and manifest builders.

use ferry_torrent_core::{ContentDescriptor, FileManifestEntry};

/// One decimal gigabyte.
pub const GB: u64 = 1_000_000_000;

/// Magnet URI for `id` with no display name.
#[must_use]
pub fn magnet(id: &str) -> String {
    format!("magnet:?xt=urn:btih:{id}")
}

/// Parsed descriptor for `id` with no display name.
///
/// # Panics
///
/// Panics if `id` produces an unparsable URI.
#[must_use]
pub fn descriptor(id: &str) -> ContentDescriptor {
    ContentDescriptor::parse(&magnet(id)).expect("fixture magnet must parse")
}

/// Parsed descriptor for `id` carrying display name `name`.
///
/// # Panics
///
/// Panics if the inputs produce an unparsable URI.
#[must_use]
pub fn named_descriptor(id: &str, name: &str) -> ContentDescriptor {
    let uri = format!("{}&dn={}", magnet(id), name.replace(' ', "%20"));
    ContentDescriptor::parse(&uri).expect("fixture magnet must parse")
}

/// Manifest with consecutive indices for `(path, size)` pairs.
#[must_use]
pub fn manifest(files: &[(&str, u64)]) -> Vec<FileManifestEntry> {
    files
        .iter()
        .zip(0_u32..)
        .map(|((path, size), index)| FileManifestEntry {
            index,
            relative_path: (*path).to_string(),
            size_bytes: *size,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_descriptor_keeps_spaces() {
        let descriptor = named_descriptor("abc123", "Big Show");
        assert_eq!(descriptor.display_name(), Some("Big Show"));
        assert_eq!(descriptor.content_id().as_str(), "abc123");
    }

    #[test]
    fn manifest_numbers_entries() {
        let entries = manifest(&[("a", 1), ("b", 2)]);
        assert_eq!(entries[1].index, 1);
        assert_eq!(entries[1].size_bytes, 2);
    }
}
