//! YAML file loading and `FERRY_*` environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::model::FerryConfig;
use crate::normalize::normalize;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "FERRY_";

/// Normalised configuration plus the guard-rail warnings it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    /// Effective values.
    pub config: FerryConfig,
    /// Human-readable adjustments.
    pub warnings: Vec<String>,
}

/// Load from `path` (defaults when `None`), apply the process environment,
/// then normalise.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or an override
/// carries an unusable value.
pub fn load_from_env(path: Option<&Path>) -> ConfigResult<EffectiveConfig> {
    load(path, std::env::vars())
}

/// Load from `path` (defaults when `None`), apply `vars` as overrides, then
/// normalise.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or an override
/// carries an unusable value.
pub fn load<I>(path: Option<&Path>, vars: I) -> ConfigResult<EffectiveConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => FerryConfig::default(),
    };
    apply_env_overrides(&mut config, vars)?;
    let (config, warnings) = normalize(config);
    for warning in &warnings {
        warn!(warning = %warning, "configuration adjusted");
    }
    Ok(EffectiveConfig { config, warnings })
}

fn read_file(path: &Path) -> ConfigResult<FerryConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(FerryConfig::default());
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply recognised `FERRY_*` variables to `config`. Unrecognised names are
/// ignored.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when a numeric override does not parse.
pub fn apply_env_overrides<I>(config: &mut FerryConfig, vars: I) -> ConfigResult<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match name {
            "DOWNLOAD_ROOT" => config.storage.download_root = PathBuf::from(value),
            "RESUME_DIR" => config.storage.resume_dir = Some(PathBuf::from(value)),
            "LOG_LEVEL" => config.logging.level = value,
            "LOG_FORMAT" => config.logging.format = Some(value),
            "DRIVE_FOLDER" => config.upload.folder = value,
            "DRIVE_TOKEN_FILE" => config.upload.token_file = Some(PathBuf::from(value)),
            "DRIVE_API_BASE" => config.upload.api_base = value,
            "WORKERS" => config.workers = parse_number("workers", "workers", &value)?,
            "METADATA_TIMEOUT_SECS" => {
                config.transfer.metadata_timeout_secs =
                    parse_number("transfer", "metadata_timeout_secs", &value)?;
            }
            "ADD_TRACKERS" => {
                config.transfer.add_trackers = parse_flag("transfer", "add_trackers", &value)?;
            }
            _ => continue,
        }
        debug!(variable = %key, "configuration override applied");
    }
    Ok(())
}

fn parse_number<T: FromStr>(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidField {
            section,
            field,
            value: value.to_string(),
            reason: "not a non-negative integer",
        })
}

fn parse_flag(section: &'static str, field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidField {
            section,
            field,
            value: value.to_string(),
            reason: "not a boolean",
        }),
    }
}
