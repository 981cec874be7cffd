//! Structured failures for filesystem helpers.
//!
//! Messages are constant; the operation, path and offending value travel as
//! fields so callers can render or match on them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem helpers.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by filesystem helpers.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failure.
    #[error("fsops io failure")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failure.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Zip writer failure.
    #[error("fsops zip failure")]
    Zip {
        /// Operation that failed.
        operation: &'static str,
        /// Archive path.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Filesystem statistics syscall failure.
    #[error("fsops nix failure")]
    Nix {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Input rejected before touching the filesystem.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Blocking worker did not complete.
    #[error("fsops blocking task failed")]
    Join {
        /// Operation that was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Render the error together with its context fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
            Self::Zip {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
            Self::Nix {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
            Self::InvalidInput {
                field,
                reason,
                value,
            } => match value {
                Some(value) => format!("{field} {reason}: {value}"),
                None => format!("{field} {reason}"),
            },
            Self::Join { operation, source } => format!("{operation}: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn messages_are_constant_and_sources_preserved() {
        let cases = vec![
            (
                FsOpsError::io("read", "a.txt", io::Error::other("denied")),
                "fsops io failure",
                true,
            ),
            (
                FsOpsError::zip("finish", "a.zip", zip::result::ZipError::FileNotFound),
                "fsops zip failure",
                true,
            ),
            (
                FsOpsError::InvalidInput {
                    field: "archive_name",
                    reason: "empty",
                    value: None,
                },
                "fsops invalid input",
                false,
            ),
        ];
        for (err, message, has_source) in cases {
            assert_eq!(err.to_string(), message);
            assert_eq!(err.source().is_some(), has_source);
        }
    }

    #[test]
    fn detail_includes_context() {
        let err = FsOpsError::io("read", "dir/a.txt", io::Error::other("denied"));
        assert_eq!(err.detail(), "read dir/a.txt: denied");
    }
}
