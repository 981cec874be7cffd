//! Shared services, error types, and exit codes for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use ferry_app::{AppError, FerryApp, init_telemetry};
use ferry_events::{FanoutObserver, TracingObserver, TransferObserver};
use ferry_session::{LoopbackEngine, LoopbackFactory};
use ferry_telemetry::TelemetryError;
use ferry_torrent_core::TransferError;
use tracing::{debug, warn};

use crate::cli::OutputFormat;
use crate::console::ConsoleObserver;

/// Exit code for a run interrupted with Ctrl-C.
pub(crate) const EXIT_INTERRUPTED: i32 = 130;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
    /// A controller failure already shown through the console observer.
    Reported(TransferError),
    Interrupted,
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Reported(TransferError::InvalidDescriptor { .. }) => 2,
            Self::Failure(_) | Self::Reported(_) => 3,
            Self::Interrupted => EXIT_INTERRUPTED,
        }
    }

    /// Line for stderr, or `None` when the console already showed it.
    pub(crate) fn display_message(&self) -> Option<String> {
        match self {
            Self::Validation(message) => Some(message.clone()),
            Self::Failure(error) => Some(format!("{error:#}")),
            Self::Reported(_) => None,
            Self::Interrupted => Some("interrupted".to_string()),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<TransferError> for CliError {
    fn from(error: TransferError) -> Self {
        Self::Reported(error)
    }
}

impl From<AppError> for CliError {
    fn from(error: AppError) -> Self {
        let operation = match &error {
            AppError::Config { operation, .. }
            | AppError::Telemetry { operation, .. }
            | AppError::Drive { operation, .. }
            | AppError::Io { operation, .. }
            | AppError::Join { operation, .. } => *operation,
        };
        Self::Failure(anyhow::Error::new(error).context(format!("{operation} failed")))
    }
}

/// Application context passed to command handlers.
pub(crate) struct CliContext {
    pub(crate) app: FerryApp,
    pub(crate) output: OutputFormat,
    pub(crate) quiet: bool,
}

impl CliContext {
    /// Load configuration, install logging, and wire services over the
    /// loopback engine.
    pub(crate) fn bootstrap(
        config: Option<&Path>,
        output: OutputFormat,
        quiet: bool,
    ) -> CliResult<Self> {
        let factory = Arc::new(LoopbackFactory::new(LoopbackEngine::new()));
        let app = FerryApp::from_env(config, factory)?;
        match init_telemetry(&app.config().logging) {
            Err(AppError::Telemetry {
                source: TelemetryError::SubscriberInstall { .. },
                ..
            }) => debug!("logging already initialised"),
            Err(err) => return Err(err.into()),
            Ok(()) => {}
        }
        for warning in app.config_warnings() {
            warn!(warning = %warning, "configuration adjusted");
        }
        Ok(Self { app, output, quiet })
    }

    /// Observer for one command: the console plus the log.
    pub(crate) fn observer(&self, label: &str) -> (Arc<ConsoleObserver>, Arc<dyn TransferObserver>) {
        let console = Arc::new(ConsoleObserver::new(self.quiet));
        let fanout = FanoutObserver::default()
            .with(console.clone())
            .with(Arc::new(TracingObserver::new(label)));
        (console, Arc::new(fanout))
    }
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> CliResult<()> {
    if value.trim().is_empty() {
        return Err(CliError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn json_failure(err: serde_json::Error) -> CliError {
    CliError::failure(anyhow!("failed to format JSON: {err}"))
}
