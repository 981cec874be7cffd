//! Logging setup failures.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing the logger.
#[derive(Debug)]
pub enum TelemetryError {
    /// The configured level is not a valid filter directive.
    InvalidFilter {
        /// Directive as configured.
        directive: String,
        /// Parser error.
        source: ParseError,
    },
    /// A global subscriber is already installed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: TryInitError,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilter { .. } => formatter.write_str("invalid log filter directive"),
            Self::SubscriberInstall { .. } => formatter.write_str("logger already installed"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFilter { source, .. } => Some(source),
            Self::SubscriberInstall { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn invalid_filter_keeps_directive_and_source() -> anyhow::Result<()> {
        let source = match EnvFilter::try_new("ferry=loud") {
            Ok(_) => anyhow::bail!("directive unexpectedly parsed"),
            Err(err) => err,
        };
        let err = TelemetryError::InvalidFilter {
            directive: "ferry=loud".to_string(),
            source,
        };
        assert_eq!(err.to_string(), "invalid log filter directive");
        assert!(err.source().is_some());
        Ok(())
    }
}
