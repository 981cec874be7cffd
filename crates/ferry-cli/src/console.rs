//! Terminal observer: status lines on stderr and one progress bar at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ferry_events::{ProgressSample, Severity, TransferObserver, TransferState};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::format_rate;

const DOWNLOAD_SCALE: u64 = 1_000;
const DOWNLOAD_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}";
const UPLOAD_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.magenta/blue}] {pos:>3}% upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarKind {
    Download,
    Upload,
}

struct ActiveBar {
    kind: BarKind,
    bar: ProgressBar,
}

/// Console rendering of observer callbacks.
pub(crate) struct ConsoleObserver {
    quiet: bool,
    active: Mutex<Option<ActiveBar>>,
}

impl ConsoleObserver {
    /// Observer printing to stderr; `quiet` hides progress bars.
    pub(crate) const fn new(quiet: bool) -> Self {
        Self {
            quiet,
            active: Mutex::new(None),
        }
    }

    /// Clear any bar still on screen.
    pub(crate) fn finish(&self) {
        if let Some(active) = self.lock().take() {
            active.bar.finish_and_clear();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveBar>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_bar(&self, kind: BarKind, apply: impl FnOnce(&ProgressBar)) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|active| active.kind != kind)
            && let Some(previous) = guard.take()
        {
            previous.bar.finish_and_clear();
        }
        let active = guard.get_or_insert_with(|| ActiveBar {
            kind,
            bar: self.create_bar(kind),
        });
        apply(&active.bar);
    }

    fn create_bar(&self, kind: BarKind) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let (length, template) = match kind {
            BarKind::Download => (DOWNLOAD_SCALE, DOWNLOAD_TEMPLATE),
            BarKind::Upload => (100, UPLOAD_TEMPLATE),
        };
        let bar = ProgressBar::new(length);
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        bar
    }

    #[cfg(test)]
    fn active_kind(&self) -> Option<BarKind> {
        self.lock().as_ref().map(|active| active.kind)
    }
}

impl TransferObserver for ConsoleObserver {
    fn on_status(&self, message: &str, severity: Severity) {
        let line = status_line(message, severity);
        match self.lock().as_ref() {
            Some(active) if !active.bar.is_hidden() => active.bar.println(line),
            _ => eprintln!("{line}"),
        }
    }

    fn on_progress(&self, sample: &ProgressSample) {
        self.with_bar(BarKind::Download, |bar| {
            bar.set_position(scaled_position(sample.percent_complete));
            bar.set_message(progress_message(sample));
        });
    }

    fn on_upload_progress(&self, percent: u8) {
        self.with_bar(BarKind::Upload, |bar| bar.set_position(u64::from(percent)));
        if percent >= 100 {
            self.finish();
        }
    }

    fn on_state(&self, state: &TransferState) {
        if state.is_terminal() {
            self.finish();
        }
    }
}

/// Prefix a status line by severity.
pub(crate) fn status_line(message: &str, severity: Severity) -> String {
    match severity {
        Severity::Info => message.to_string(),
        Severity::Success => format!("✓ {message}"),
        Severity::Warning => format!("warning: {message}"),
        Severity::Error => format!("error: {message}"),
    }
}

fn progress_message(sample: &ProgressSample) -> String {
    format!(
        "↓ {} ↑ {} | peers {} | eta {}",
        format_rate(sample.download_rate_bps),
        format_rate(sample.upload_rate_bps),
        sample.peer_count,
        sample.eta_label
    )
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "percent is clamped to [0, 100] before scaling"
)]
fn scaled_position(percent: f64) -> u64 {
    (percent.clamp(0.0, 100.0) * 10.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_carry_severity() {
        assert_eq!(status_line("Downloading...", Severity::Info), "Downloading...");
        assert_eq!(status_line("Zip: a.zip", Severity::Success), "✓ Zip: a.zip");
        assert_eq!(status_line("Stopped", Severity::Warning), "warning: Stopped");
        assert_eq!(status_line("boom", Severity::Error), "error: boom");
    }

    #[test]
    fn positions_are_per_mille() {
        assert_eq!(scaled_position(0.0), 0);
        assert_eq!(scaled_position(42.5), 425);
        assert_eq!(scaled_position(150.0), 1_000);
        assert_eq!(scaled_position(-5.0), 0);
    }

    #[test]
    fn bars_switch_and_clear() {
        let console = ConsoleObserver::new(true);
        console.on_progress(&ProgressSample::from_counters(100, 40, 10, 0, 3));
        assert_eq!(console.active_kind(), Some(BarKind::Download));

        console.on_state(&TransferState::Completed);
        assert_eq!(console.active_kind(), None);

        console.on_upload_progress(50);
        assert_eq!(console.active_kind(), Some(BarKind::Upload));
        console.on_upload_progress(100);
        assert_eq!(console.active_kind(), None);
    }

    #[test]
    fn progress_message_lists_rates() {
        let sample = ProgressSample::from_counters(1_000, 500, 2_048, 0, 7);
        let message = progress_message(&sample);
        assert!(message.contains("peers 7"), "{message}");
        assert!(message.contains("eta"), "{message}");
    }
}
