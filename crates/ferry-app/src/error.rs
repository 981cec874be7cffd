//! # Design
//!
//! - Centralize wiring errors for bootstrap and background jobs.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Transfer failures stay in `TransferError`; this type covers the plumbing around them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ferry_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: ferry_telemetry::TelemetryError,
    },
    /// Upload backend construction failed.
    #[error("upload backend operation failed")]
    Drive {
        /// Operation identifier.
        operation: &'static str,
        /// Source drive error.
        source: ferry_drive::DriveError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// A background job panicked or was aborted.
    #[error("background job failed")]
    Join {
        /// Job kind.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ferry_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: ferry_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn drive(operation: &'static str, source: ferry_drive::DriveError) -> Self {
        Self::Drive { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn join(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Join { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            ferry_config::ConfigError::InvalidField {
                section: "workers",
                field: "workers",
                value: "many".to_string(),
                reason: "not a non-negative integer",
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let drive = AppError::drive(
            "drive.build",
            ferry_drive::DriveError::Protocol {
                operation: "client.build",
                reason: "no client",
            },
        );
        assert!(matches!(drive, AppError::Drive { .. }));

        let io = AppError::io("storage.prepare", "/data", io::Error::other("denied"));
        assert!(matches!(io, AppError::Io { ref path, .. } if path == &PathBuf::from("/data")));
        assert_eq!(io.to_string(), "io operation failed");
    }

    #[tokio::test]
    async fn join_errors_are_wrapped() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let Err(source) = handle.await else {
            panic!("aborted task should not complete");
        };
        let err = AppError::join("fetch", source);
        assert!(matches!(err, AppError::Join { operation: "fetch", .. }));
        assert_eq!(err.to_string(), "background job failed");
    }
}
