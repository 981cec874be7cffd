//! Error types for the storage backend.

use std::io;
use std::path::PathBuf;

use ferry_torrent_core::TransferError;
use thiserror::Error;

/// Result alias for backend operations.
pub type DriveResult<T> = Result<T, DriveError>;

/// Failures raised by storage backends and credential sources.
#[derive(Debug, Error)]
pub enum DriveError {
    /// No credential source produced a token.
    #[error("no access token available")]
    MissingToken {
        /// Sources that were consulted.
        tried: Vec<&'static str>,
    },
    /// A credential source failed outright.
    #[error("credential source failed")]
    TokenSource {
        /// Source identifier.
        source_name: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The remote service rejected the credentials.
    #[error("remote service rejected credentials")]
    Unauthorized {
        /// Operation identifier.
        operation: &'static str,
        /// Response body, if any.
        message: String,
    },
    /// The remote service answered with an error status.
    #[error("remote service returned an error")]
    Api {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },
    /// The request could not be sent or its response not decoded.
    #[error("remote request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The remote service answered with something unexpected.
    #[error("unexpected remote response")]
    Protocol {
        /// Operation identifier.
        operation: &'static str,
        /// What was missing or malformed.
        reason: &'static str,
    },
    /// The artifact being uploaded could not be read.
    #[error("failed to read upload source")]
    LocalFile {
        /// Artifact path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl DriveError {
    pub(crate) const fn transport(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { operation, source }
    }

    pub(crate) fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalFile {
            path: path.into(),
            source,
        }
    }
}

impl From<DriveError> for TransferError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::MissingToken { tried } => Self::AuthenticationFailed {
                message: format!("no access token found (tried {})", tried.join(", ")),
            },
            DriveError::TokenSource {
                source_name,
                source,
            } => Self::AuthenticationFailed {
                message: format!("{source_name}: {source}"),
            },
            DriveError::Unauthorized { operation, message } => Self::AuthenticationFailed {
                message: if message.is_empty() {
                    format!("{operation} was rejected")
                } else {
                    format!("{operation} was rejected: {message}")
                },
            },
            DriveError::Api {
                operation,
                status,
                message,
            } => Self::RemoteApiError {
                operation,
                status: Some(status),
                message,
            },
            DriveError::Transport { operation, source } => Self::RemoteApiError {
                operation,
                status: source.status().map(|status| status.as_u16()),
                message: source.to_string(),
            },
            DriveError::Protocol { operation, reason } => Self::RemoteApiError {
                operation,
                status: None,
                message: reason.to_string(),
            },
            DriveError::LocalFile { path, source } => Self::LocalFileUnreadable { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_folds_to_authentication_failed() {
        let err: TransferError = DriveError::Unauthorized {
            operation: "files.list",
            message: String::new(),
        }
        .into();
        assert_eq!(err.kind(), "authentication_failed");
        assert!(err.describe().contains("files.list was rejected"));
    }

    #[test]
    fn api_errors_keep_status() {
        let err: TransferError = DriveError::Api {
            operation: "files.create",
            status: 500,
            message: "backend error".into(),
        }
        .into();
        assert!(matches!(
            err,
            TransferError::RemoteApiError {
                status: Some(500),
                ..
            }
        ));
    }

    #[test]
    fn local_file_errors_fold_to_unreadable() {
        let err: TransferError = DriveError::local("/tmp/x.zip", io::Error::other("gone")).into();
        assert_eq!(err.kind(), "local_file_unreadable");
    }
}
