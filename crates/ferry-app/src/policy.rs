//! Timings and guards applied by [`crate::TransferController`].

use std::time::Duration;

use ferry_config::TransferSection;

/// Unity margin; the preflight never asks for less than the selection itself.
const MIN_MARGIN_BP: u32 = 10_000;

/// Metadata ticks between "still waiting" status lines.
pub const METADATA_CHATTER_TICKS: u64 = 10;

/// Controller policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPolicy {
    /// Give up on metadata after this long.
    pub metadata_timeout: Duration,
    /// Wait between metadata polls.
    pub metadata_poll: Duration,
    /// Wait between download polls.
    pub download_poll: Duration,
    /// Periodic checkpoint cadence while downloading.
    pub checkpoint_interval: Duration,
    /// Free-space margin in basis points.
    pub margin_bp: u32,
    /// Union [`TransferPolicy::trackers`] into analysed descriptors.
    pub add_trackers: bool,
    /// Discovery endpoints to union in.
    pub trackers: Vec<String>,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self::from(&TransferSection::default())
    }
}

impl From<&TransferSection> for TransferPolicy {
    fn from(section: &TransferSection) -> Self {
        Self {
            metadata_timeout: section.metadata_timeout(),
            metadata_poll: Duration::from_secs(section.metadata_poll_secs.max(1)),
            download_poll: Duration::from_secs(section.download_poll_secs.max(1)),
            checkpoint_interval: Duration::from_secs(section.checkpoint_interval_secs.max(1)),
            margin_bp: section.margin_basis_points().max(MIN_MARGIN_BP),
            add_trackers: section.add_trackers,
            trackers: section.trackers.clone(),
        }
    }
}

impl TransferPolicy {
    /// Metadata polls allowed before the deadline, rounded up.
    #[must_use]
    pub fn metadata_ticks(&self) -> u64 {
        let poll = self.metadata_poll.as_millis().max(1);
        let ticks = self.metadata_timeout.as_millis().div_ceil(poll);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_configuration() {
        let policy = TransferPolicy::default();
        assert_eq!(policy.metadata_timeout, Duration::from_secs(900));
        assert_eq!(policy.download_poll, Duration::from_secs(2));
        assert_eq!(policy.checkpoint_interval, Duration::from_secs(300));
        assert_eq!(policy.margin_bp, 11_000);
        assert_eq!(policy.trackers.len(), 9);
        assert_eq!(policy.metadata_ticks(), 900);
    }

    #[test]
    fn ticks_round_up() {
        let policy = TransferPolicy {
            metadata_timeout: Duration::from_secs(5),
            metadata_poll: Duration::from_secs(2),
            ..TransferPolicy::default()
        };
        assert_eq!(policy.metadata_ticks(), 3);
    }
}
