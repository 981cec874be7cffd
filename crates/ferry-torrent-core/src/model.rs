//! Transfer DTOs shared by engines, controllers and presentation layers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One file declared by the content metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifestEntry {
    /// Position in the engine's file table. Stable for one transfer.
    pub index: u32,
    /// Path relative to the destination root, `/`-separated.
    pub relative_path: String,
    /// Declared size.
    pub size_bytes: u64,
}

/// Name, size and manifest reported by an analyze pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Display name reported by the engine.
    pub name: String,
    /// Sum of every manifest entry.
    pub total_bytes: u64,
    /// Every file in engine order.
    pub files: Vec<FileManifestEntry>,
}

impl ContentMetadata {
    /// Assemble metadata, summing sizes from the manifest.
    #[must_use]
    pub fn new(name: impl Into<String>, files: Vec<FileManifestEntry>) -> Self {
        let total_bytes = files.iter().map(|entry| entry.size_bytes).sum();
        Self {
            name: name.into(),
            total_bytes,
            files,
        }
    }
}

/// Per-file download priority.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Never fetched.
    Skip,
    /// Fetched after everything else.
    Low,
    /// Engine default.
    #[default]
    Normal,
    /// Fetched first.
    High,
}

impl FilePriority {
    /// Numeric level on the 0..=7 scale common to swarm engines.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Skip => 0,
            Self::Low => 1,
            Self::Normal => 4,
            Self::High => 7,
        }
    }
}

/// A manifest entry that would land outside the destination root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestViolation {
    /// Offending file index.
    pub index: u32,
    /// Path as declared.
    pub relative_path: String,
    /// Which rule it broke.
    pub reason: String,
}

/// Point-in-time status polled from an engine handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Whether the manifest is known.
    pub has_metadata: bool,
    /// Display name, once known.
    pub name: Option<String>,
    /// Bytes selected for download.
    pub total_wanted: u64,
    /// Selected bytes already verified.
    pub total_wanted_done: u64,
    /// Download rate in bytes per second.
    pub download_rate_bps: u64,
    /// Upload rate in bytes per second.
    pub upload_rate_bps: u64,
    /// Connected peers.
    pub peers: u32,
    /// Every wanted byte is on disk (seeding or finished).
    pub is_finished: bool,
}

/// Priorities and byte totals derived from a caller's file selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    /// One priority per manifest entry, in manifest order.
    pub priorities: Vec<FilePriority>,
    /// Bytes the transfer will fetch.
    pub selected_bytes: u64,
    /// Indices of the entries that will be fetched.
    pub selected: BTreeSet<u32>,
    /// Requested indices with no matching manifest entry.
    pub ignored: Vec<u32>,
}

impl SelectionPlan {
    /// Plan priorities for `manifest`.
    ///
    /// `None` selects everything. Requested indices beyond the manifest are
    /// reported in [`SelectionPlan::ignored`] and otherwise have no effect.
    #[must_use]
    pub fn build(manifest: &[FileManifestEntry], selection: Option<&BTreeSet<u32>>) -> Self {
        let mut priorities = Vec::with_capacity(manifest.len());
        let mut selected = BTreeSet::new();
        let mut selected_bytes = 0_u64;
        for entry in manifest {
            let wanted = selection.is_none_or(|set| set.contains(&entry.index));
            if wanted {
                selected.insert(entry.index);
                selected_bytes = selected_bytes.saturating_add(entry.size_bytes);
                priorities.push(FilePriority::Normal);
            } else {
                priorities.push(FilePriority::Skip);
            }
        }
        let ignored = selection
            .map(|set| {
                set.iter()
                    .copied()
                    .filter(|index| !manifest.iter().any(|entry| entry.index == *index))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            priorities,
            selected_bytes,
            selected,
            ignored,
        }
    }

    /// Whether every manifest entry ends up selected.
    #[must_use]
    pub fn selects_all(&self) -> bool {
        self.priorities
            .iter()
            .all(|priority| *priority != FilePriority::Skip)
    }
}

/// Fixed policy applied when the shared engine session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Distributed hash table discovery.
    pub enable_dht: bool,
    /// Local service discovery.
    pub enable_lsd: bool,
    /// `UPnP` port mapping.
    pub enable_upnp: bool,
    /// NAT-PMP port mapping.
    pub enable_natpmp: bool,
    /// Connection ceiling across all transfers.
    pub connections_limit: u32,
    /// Download cap in bytes per second.
    pub download_rate_limit: u64,
    /// Upload cap in bytes per second.
    pub upload_rate_limit: u64,
    /// Concurrently downloading items.
    pub active_downloads: u32,
    /// Concurrently seeding items.
    pub active_seeds: u32,
    /// Concurrently active items of any kind.
    pub active_limit: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            enable_dht: true,
            enable_lsd: true,
            enable_upnp: false,
            enable_natpmp: false,
            connections_limit: 500,
            download_rate_limit: 25 * 1024 * 1024,
            upload_rate_limit: 5 * 1024 * 1024,
            active_downloads: 10,
            active_seeds: 5,
            active_limit: 15,
        }
    }
}
