//! Checkpoint store failures.

use std::io;
use std::path::PathBuf;

use ferry_torrent_core::TransferError;
use thiserror::Error;

/// Result alias for checkpoint store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by [`crate::ResumeStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("checkpoint store io failure")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Envelope could not be encoded or decoded.
    #[error("checkpoint store json failure")]
    Json {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Envelope decoded but failed verification.
    #[error("checkpoint failed verification")]
    Corrupt {
        /// Path of the rejected file.
        path: PathBuf,
        /// Which check failed.
        reason: &'static str,
    },
    /// Blocking writer did not complete.
    #[error("checkpoint writer task failed")]
    Join {
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io {
                operation,
                path,
                source,
            } => Self::StorageError {
                operation,
                path,
                source,
            },
            StoreError::Json {
                operation,
                path,
                source,
            } => Self::StorageError {
                operation,
                path,
                source: io::Error::new(io::ErrorKind::InvalidData, source),
            },
            StoreError::Corrupt { path, reason } => Self::StorageError {
                operation: "checkpoint.verify",
                path,
                source: io::Error::new(io::ErrorKind::InvalidData, reason),
            },
            StoreError::Join { source } => Self::StorageError {
                operation: "checkpoint.write",
                path: PathBuf::new(),
                source: io::Error::other(source),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_fold_into_storage_errors() {
        let err: TransferError =
            StoreError::io("checkpoint.read", "x.resume", io::Error::other("denied")).into();
        assert_eq!(err.kind(), "storage_error");

        let err: TransferError = StoreError::corrupt("x.resume", "digest mismatch").into();
        assert!(err.describe().contains("digest mismatch"));
    }
}
