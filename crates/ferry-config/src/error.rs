//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read configuration file")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The config file is not valid YAML for the model.
    #[error("failed to parse configuration file")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
    /// An override carried an unusable value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section containing the field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Machine-readable reason.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_are_constant() {
        let err = ConfigError::InvalidField {
            section: "workers",
            field: "workers",
            value: "many".into(),
            reason: "not an integer",
        };
        assert_eq!(err.to_string(), "invalid configuration field");
        assert!(err.source().is_none());

        let err = ConfigError::Io {
            path: PathBuf::from("ferry.yaml"),
            source: io::Error::other("missing"),
        };
        assert_eq!(err.to_string(), "failed to read configuration file");
        assert!(err.source().is_some());
    }
}
