//! Observer that records every callback for later assertions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ferry_events::{ProgressSample, Severity, TransferObserver, TransferState};

#[derive(Default)]
struct Recorded {
    statuses: Vec<(String, Severity)>,
    samples: Vec<ProgressSample>,
    uploads: Vec<u8>,
    states: Vec<TransferState>,
}

/// Thread-safe recorder of observer callbacks.
#[derive(Default)]
pub struct RecordingObserver {
    inner: Mutex<Recorded>,
}

impl RecordingObserver {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Status lines in arrival order.
    #[must_use]
    pub fn statuses(&self) -> Vec<(String, Severity)> {
        self.lock().statuses.clone()
    }

    /// Status lines of one severity.
    #[must_use]
    pub fn statuses_with(&self, severity: Severity) -> Vec<String> {
        self.lock()
            .statuses
            .iter()
            .filter(|(_, recorded)| *recorded == severity)
            .map(|(message, _)| message.clone())
            .collect()
    }

    /// Whether any status line contains `needle`.
    #[must_use]
    pub fn saw_status(&self, needle: &str) -> bool {
        self.lock()
            .statuses
            .iter()
            .any(|(message, _)| message.contains(needle))
    }

    /// Download samples in arrival order.
    #[must_use]
    pub fn samples(&self) -> Vec<ProgressSample> {
        self.lock().samples.clone()
    }

    /// Upload percentages in arrival order.
    #[must_use]
    pub fn uploads(&self) -> Vec<u8> {
        self.lock().uploads.clone()
    }

    /// State transitions in arrival order.
    #[must_use]
    pub fn states(&self) -> Vec<TransferState> {
        self.lock().states.clone()
    }
}

impl TransferObserver for RecordingObserver {
    fn on_status(&self, message: &str, severity: Severity) {
        self.lock().statuses.push((message.to_string(), severity));
    }

    fn on_progress(&self, sample: &ProgressSample) {
        self.lock().samples.push(sample.clone());
    }

    fn on_upload_progress(&self, percent: u8) {
        self.lock().uploads.push(percent);
    }

    fn on_state(&self, state: &TransferState) {
        self.lock().states.push(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let observer = RecordingObserver::new();
        observer.on_status("one", Severity::Info);
        observer.on_status("two", Severity::Error);
        observer.on_upload_progress(5);
        observer.on_state(&TransferState::Stopped);

        assert_eq!(observer.statuses().len(), 2);
        assert_eq!(observer.statuses_with(Severity::Error), vec!["two".to_string()]);
        assert!(observer.saw_status("on"));
        assert_eq!(observer.uploads(), vec![5]);
        assert_eq!(observer.states(), vec![TransferState::Stopped]);
    }
}
