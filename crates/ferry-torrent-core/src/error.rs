//! Closed set of failures reported by the transfer and upload controllers.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::ManifestViolation;

/// Every way a transfer or upload can fail.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The content descriptor could not be parsed.
    #[error("invalid content descriptor")]
    InvalidDescriptor {
        /// Which rule failed.
        reason: &'static str,
        /// Input as supplied.
        value: String,
    },
    /// Metadata did not arrive before the deadline.
    #[error("timed out waiting for metadata")]
    MetadataTimeout {
        /// Configured deadline.
        timeout: Duration,
    },
    /// Manifest entries would resolve outside the destination root.
    #[error("unsafe manifest entry")]
    UnsafeManifestEntry {
        /// Every offending entry.
        entries: Vec<ManifestViolation>,
    },
    /// The destination volume lacks room for the selection plus margin.
    #[error("insufficient disk space")]
    InsufficientSpace {
        /// Bytes needed, margin included.
        required: u64,
        /// Bytes free on the destination volume.
        available: u64,
    },
    /// The swarm engine reported a failure.
    #[error("engine operation failed")]
    EngineError {
        /// Operation identifier.
        operation: &'static str,
        /// Rendered engine error chain.
        message: String,
    },
    /// Local filesystem access failed.
    #[error("storage operation failed")]
    StorageError {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Remote storage rejected or could not obtain credentials.
    #[error("remote authentication failed")]
    AuthenticationFailed {
        /// Detail from the credential source or remote service.
        message: String,
    },
    /// Remote storage returned an error.
    #[error("remote api call failed")]
    RemoteApiError {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status when one was received.
        status: Option<u16>,
        /// Detail from the remote service or transport.
        message: String,
    },
    /// The artifact to upload could not be read.
    #[error("local file unreadable")]
    LocalFileUnreadable {
        /// Artifact path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Packaging the fetched output failed.
    #[error("archive creation failed")]
    ArchiveError {
        /// Archive path.
        path: PathBuf,
        /// Rendered archive error.
        message: String,
    },
}

impl TransferError {
    pub(crate) fn invalid_descriptor(reason: &'static str, value: &str) -> Self {
        Self::InvalidDescriptor {
            reason,
            value: value.to_string(),
        }
    }

    /// Fold an engine adapter error into the taxonomy.
    #[must_use]
    pub fn engine(operation: &'static str, error: &anyhow::Error) -> Self {
        Self::EngineError {
            operation,
            message: format!("{error:#}"),
        }
    }

    /// Wrap a local IO failure.
    #[must_use]
    pub fn storage(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StorageError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Short snake-case discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor { .. } => "invalid_descriptor",
            Self::MetadataTimeout { .. } => "metadata_timeout",
            Self::UnsafeManifestEntry { .. } => "unsafe_manifest_entry",
            Self::InsufficientSpace { .. } => "insufficient_space",
            Self::EngineError { .. } => "engine_error",
            Self::StorageError { .. } => "storage_error",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::RemoteApiError { .. } => "remote_api_error",
            Self::LocalFileUnreadable { .. } => "local_file_unreadable",
            Self::ArchiveError { .. } => "archive_error",
        }
    }

    /// One-line human-readable account including the context fields.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::InvalidDescriptor { reason, value } => {
                format!("Invalid magnet link ({reason}): {value:?}")
            }
            Self::MetadataTimeout { timeout } => {
                format!("Timed out after {}s waiting for metadata", timeout.as_secs())
            }
            Self::UnsafeManifestEntry { entries } => {
                let listed: Vec<String> = entries
                    .iter()
                    .map(|entry| {
                        format!("#{} {:?} ({})", entry.index, entry.relative_path, entry.reason)
                    })
                    .collect();
                format!(
                    "Refusing {} unsafe file path(s): {}",
                    entries.len(),
                    listed.join(", ")
                )
            }
            Self::InsufficientSpace {
                required,
                available,
            } => format!(
                "Not enough space: need {}, have {}",
                human_bytes(*required),
                human_bytes(*available)
            ),
            Self::EngineError { operation, message } => {
                format!("Engine error during {operation}: {message}")
            }
            Self::StorageError {
                operation,
                path,
                source,
            } => format!("Storage error during {operation} at {}: {source}", path.display()),
            Self::AuthenticationFailed { message } => format!("Authentication failed: {message}"),
            Self::RemoteApiError {
                operation,
                status,
                message,
            } => match status {
                Some(code) => format!("Remote error during {operation} (HTTP {code}): {message}"),
                None => format!("Remote error during {operation}: {message}"),
            },
            Self::LocalFileUnreadable { path, source } => {
                format!("Cannot read {}: {source}", path.display())
            }
            Self::ArchiveError { path, message } => {
                format!("Zip error for {}: {message}", path.display())
            }
        }
    }
}

/// Convenience alias for controller results.
pub type TransferResult<T> = Result<T, TransferError>;

/// Render a byte count in decimal gigabytes with two decimals.
#[must_use]
pub fn human_bytes(bytes: u64) -> String {
    let hundredths = u128::from(bytes) * 100 / 1_000_000_000;
    format!("{}.{:02} GB", hundredths / 100, hundredths % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_is_constant_and_describe_carries_context() {
        let err = TransferError::InsufficientSpace {
            required: 1_650_000_000,
            available: 1_000_000_000,
        };
        assert_eq!(err.to_string(), "insufficient disk space");
        assert_eq!(err.describe(), "Not enough space: need 1.65 GB, have 1.00 GB");
        assert_eq!(err.kind(), "insufficient_space");
    }

    #[test]
    fn unsafe_entries_are_all_listed() {
        let err = TransferError::UnsafeManifestEntry {
            entries: vec![
                ManifestViolation {
                    index: 0,
                    relative_path: "../a".into(),
                    reason: "parent directory component".into(),
                },
                ManifestViolation {
                    index: 3,
                    relative_path: "/etc/passwd".into(),
                    reason: "absolute path".into(),
                },
            ],
        };
        let text = err.describe();
        assert!(text.starts_with("Refusing 2 unsafe"));
        assert!(text.contains("#0") && text.contains("#3"));
    }

    #[test]
    fn storage_errors_keep_source() {
        let err = TransferError::storage("create_dir", "/tmp/x", io::Error::other("denied"));
        assert!(err.source().is_some());
        assert!(err.describe().contains("create_dir"));
    }

    #[test]
    fn engine_errors_render_chain() {
        let inner = anyhow::anyhow!("socket closed").context("status poll");
        let err = TransferError::engine("status", &inner);
        assert!(err.describe().contains("status poll: socket closed"));
    }

    #[test]
    fn human_bytes_rounds_down() {
        assert_eq!(human_bytes(0), "0.00 GB");
        assert_eq!(human_bytes(1_500_000_000), "1.50 GB");
        assert_eq!(human_bytes(999_999_999), "0.99 GB");
    }
}
