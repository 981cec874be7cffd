//! Serde model for the Ferry configuration file.

use std::path::PathBuf;
use std::time::Duration;

use ferry_torrent_core::SessionSettings;
use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FerryConfig {
    /// Local paths.
    pub storage: StorageSection,
    /// Shared engine session policy.
    pub session: SessionSection,
    /// Transfer controller timings and guards.
    pub transfer: TransferSection,
    /// Remote upload settings.
    pub upload: UploadSection,
    /// Concurrent background jobs.
    pub workers: usize,
    /// Log output.
    pub logging: LoggingSection,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            storage: StorageSection::default(),
            session: SessionSection::default(),
            transfer: TransferSection::default(),
            upload: UploadSection::default(),
            workers: defaults::WORKERS,
            logging: LoggingSection::default(),
        }
    }
}

/// Local paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Destination root for fetched content.
    pub download_root: PathBuf,
    /// Checkpoint namespace; `<download_root>/.resume` when unset.
    pub resume_dir: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from(defaults::DEFAULT_DOWNLOAD_ROOT),
            resume_dir: None,
        }
    }
}

impl StorageSection {
    /// Effective checkpoint namespace.
    #[must_use]
    pub fn resume_dir(&self) -> PathBuf {
        self.resume_dir
            .clone()
            .unwrap_or_else(|| self.download_root.join(defaults::RESUME_SUBDIR))
    }
}

/// Shared engine session policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    /// DHT discovery.
    pub dht: bool,
    /// Local service discovery.
    pub lsd: bool,
    /// `UPnP` port mapping.
    pub upnp: bool,
    /// NAT-PMP port mapping.
    pub natpmp: bool,
    /// Connection ceiling.
    pub connections_limit: u32,
    /// Download cap in bytes per second.
    pub download_rate_limit: u64,
    /// Upload cap in bytes per second.
    pub upload_rate_limit: u64,
    /// Concurrently downloading items.
    pub active_downloads: u32,
    /// Concurrently seeding items.
    pub active_seeds: u32,
    /// Concurrently active items.
    pub active_limit: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionSection {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            dht: settings.enable_dht,
            lsd: settings.enable_lsd,
            upnp: settings.enable_upnp,
            natpmp: settings.enable_natpmp,
            connections_limit: settings.connections_limit,
            download_rate_limit: settings.download_rate_limit,
            upload_rate_limit: settings.upload_rate_limit,
            active_downloads: settings.active_downloads,
            active_seeds: settings.active_seeds,
            active_limit: settings.active_limit,
        }
    }
}

impl SessionSection {
    /// Engine-facing view.
    #[must_use]
    pub const fn to_settings(&self) -> SessionSettings {
        SessionSettings {
            enable_dht: self.dht,
            enable_lsd: self.lsd,
            enable_upnp: self.upnp,
            enable_natpmp: self.natpmp,
            connections_limit: self.connections_limit,
            download_rate_limit: self.download_rate_limit,
            upload_rate_limit: self.upload_rate_limit,
            active_downloads: self.active_downloads,
            active_seeds: self.active_seeds,
            active_limit: self.active_limit,
        }
    }
}

/// Transfer controller timings and guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSection {
    /// Metadata deadline in seconds.
    pub metadata_timeout_secs: u64,
    /// Seconds between metadata polls.
    pub metadata_poll_secs: u64,
    /// Seconds between download polls.
    pub download_poll_secs: u64,
    /// Seconds between periodic checkpoints.
    pub checkpoint_interval_secs: u64,
    /// Required free space as a multiple of the selected size.
    pub space_margin: f64,
    /// Union the tracker list into every descriptor.
    pub add_trackers: bool,
    /// Trackers to union in.
    pub trackers: Vec<String>,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: defaults::METADATA_TIMEOUT_SECS,
            metadata_poll_secs: defaults::METADATA_POLL_SECS,
            download_poll_secs: defaults::DOWNLOAD_POLL_SECS,
            checkpoint_interval_secs: defaults::CHECKPOINT_INTERVAL_SECS,
            space_margin: defaults::SPACE_MARGIN,
            add_trackers: true,
            trackers: defaults::DEFAULT_TRACKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl TransferSection {
    /// Metadata deadline.
    #[must_use]
    pub const fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// Margin in basis points (1.1 becomes 11 000).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "margin is clamped to [1.0, 10.0] during normalisation"
    )]
    pub fn margin_basis_points(&self) -> u32 {
        (self.space_margin * 10_000.0).round() as u32
    }
}

/// Remote upload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSection {
    /// Destination folder name.
    pub folder: String,
    /// Bytes per upload chunk.
    pub chunk_size_bytes: u64,
    /// Progress granularity in percentage points.
    pub progress_step: u8,
    /// File holding an access token.
    pub token_file: Option<PathBuf>,
    /// Remote API base URL.
    pub api_base: String,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            folder: defaults::DRIVE_FOLDER.to_string(),
            chunk_size_bytes: defaults::CHUNK_SIZE_BYTES,
            progress_step: defaults::PROGRESS_STEP,
            token_file: None,
            api_base: defaults::DRIVE_API_BASE.to_string(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `json` or `pretty`; inferred from the build when unset.
    pub format: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
