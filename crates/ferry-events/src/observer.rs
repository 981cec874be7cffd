//! Observer capability consumed by the transfer and upload controllers.
//!
//! Callbacks are fire-and-forget. Implementations must return quickly; anything
//! slow (terminal redraws, network sinks) belongs behind a channel.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::payloads::{ProgressSample, Severity, TransferState};

/// Receives status lines and progress from a running job.
///
/// A single job calls its observer from one task at a time, so callbacks for
/// that job arrive in order. Observers shared between jobs must serialise their
/// own state.
pub trait TransferObserver: Send + Sync {
    /// A human-readable status line.
    fn on_status(&self, message: &str, severity: Severity);

    /// A download progress sample.
    fn on_progress(&self, sample: &ProgressSample);

    /// Upload progress in whole percent.
    fn on_upload_progress(&self, percent: u8);

    /// A state machine transition. Ignored unless overridden.
    fn on_state(&self, state: &TransferState) {
        let _ = state;
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_status(&self, _message: &str, _severity: Severity) {}

    fn on_progress(&self, _sample: &ProgressSample) {}

    fn on_upload_progress(&self, _percent: u8) {}
}

/// Forwards callbacks into `tracing`.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    /// Tag every record with `label` (usually a job id or content name).
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl TransferObserver for TracingObserver {
    fn on_status(&self, message: &str, severity: Severity) {
        let job = self.label.as_str();
        match severity {
            Severity::Info => info!(job, "{message}"),
            Severity::Success => info!(job, outcome = "success", "{message}"),
            Severity::Warning => warn!(job, "{message}"),
            Severity::Error => error!(job, "{message}"),
        }
    }

    fn on_progress(&self, sample: &ProgressSample) {
        debug!(
            job = %self.label,
            percent = sample.percent_complete,
            down_bps = sample.download_rate_bps,
            up_bps = sample.upload_rate_bps,
            peers = sample.peer_count,
            eta = %sample.eta_label,
            "download progress"
        );
    }

    fn on_upload_progress(&self, percent: u8) {
        debug!(job = %self.label, percent, "upload progress");
    }

    fn on_state(&self, state: &TransferState) {
        debug!(job = %self.label, state = state.label(), "state changed");
    }
}

/// Sends every callback to each wrapped observer in order.
#[derive(Clone, Default)]
pub struct FanoutObserver {
    targets: Vec<Arc<dyn TransferObserver>>,
}

impl FanoutObserver {
    /// Wrap the given observers.
    #[must_use]
    pub fn new(targets: Vec<Arc<dyn TransferObserver>>) -> Self {
        Self { targets }
    }

    /// Append another observer.
    #[must_use]
    pub fn with(mut self, target: Arc<dyn TransferObserver>) -> Self {
        self.targets.push(target);
        self
    }
}

impl TransferObserver for FanoutObserver {
    fn on_status(&self, message: &str, severity: Severity) {
        for target in &self.targets {
            target.on_status(message, severity);
        }
    }

    fn on_progress(&self, sample: &ProgressSample) {
        for target in &self.targets {
            target.on_progress(sample);
        }
    }

    fn on_upload_progress(&self, percent: u8) {
        for target in &self.targets {
            target.on_upload_progress(percent);
        }
    }

    fn on_state(&self, state: &TransferState) {
        for target in &self.targets {
            target.on_state(state);
        }
    }
}
