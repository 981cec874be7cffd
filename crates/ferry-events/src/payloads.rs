//! Value types carried by observer callbacks and bus events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity attached to a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine progress chatter.
    Info,
    /// A milestone reached successfully.
    Success,
    /// Something degraded but the operation continues.
    Warning,
    /// The operation failed.
    Error,
}

impl Severity {
    /// Lowercase label used in logs and console output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of a running download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Percent of wanted bytes acquired, clamped to `[0, 100]`.
    pub percent_complete: f64,
    /// Current download rate in bytes per second.
    pub download_rate_bps: u64,
    /// Current upload rate in bytes per second.
    pub upload_rate_bps: u64,
    /// Connected peers.
    pub peer_count: u32,
    /// Remaining time, rendered for humans.
    pub eta_label: String,
}

impl ProgressSample {
    /// Build a sample from raw engine counters.
    ///
    /// `wanted` is the number of bytes selected for download and `done` the
    /// number already verified. A zero `wanted` counts as complete.
    #[must_use]
    pub fn from_counters(
        wanted: u64,
        done: u64,
        download_rate_bps: u64,
        upload_rate_bps: u64,
        peer_count: u32,
    ) -> Self {
        let percent_complete = if wanted == 0 {
            100.0
        } else {
            (to_f64(done.min(wanted)) / to_f64(wanted) * 100.0).clamp(0.0, 100.0)
        };
        Self {
            percent_complete,
            download_rate_bps,
            upload_rate_bps,
            peer_count,
            eta_label: eta_label(wanted.saturating_sub(done), download_rate_bps),
        }
    }
}

/// Render the remaining time for `remaining` bytes at `rate_bps`.
///
/// Whole minutes as `"{m}m"`, `"<1m"` under a minute, `"∞"` when stalled.
#[must_use]
pub fn eta_label(remaining: u64, rate_bps: u64) -> String {
    if rate_bps == 0 {
        return "∞".to_string();
    }
    let minutes = remaining / rate_bps / 60;
    if minutes == 0 {
        "<1m".to_string()
    } else {
        format!("{minutes}m")
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "progress percentages tolerate f64 rounding on very large byte counts"
)]
const fn to_f64(value: u64) -> f64 {
    value as f64
}

/// States of one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferState {
    /// Controller built, nothing requested yet.
    Created,
    /// Waiting for the swarm to deliver the file manifest.
    DiscoveringMetadata,
    /// Manifest available.
    MetadataReady,
    /// Paths, selection and free space being checked.
    Validating,
    /// Payload bytes flowing.
    Downloading,
    /// All wanted bytes acquired.
    Completed,
    /// Cancelled by the caller.
    Stopped,
    /// Aborted with an error.
    Failed {
        /// Human-readable failure summary.
        message: String,
    },
}

impl TransferState {
    /// Whether the state machine can make no further progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed { .. })
    }

    /// Short lowercase label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::DiscoveringMetadata => "discovering_metadata",
            Self::MetadataReady => "metadata_ready",
            Self::Validating => "validating",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed { .. } => "failed",
        }
    }
}
