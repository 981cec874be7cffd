//! Guard rails applied after loading.
//!
//! Out-of-range values are replaced rather than rejected; every replacement
//! produces a warning line for the startup log.

use std::path::PathBuf;

use crate::defaults;
use crate::model::FerryConfig;

/// Apply guard rails, returning the effective config and what was changed.
#[must_use]
pub fn normalize(mut config: FerryConfig) -> (FerryConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.storage.download_root.as_os_str().is_empty() {
        warnings.push(format!(
            "storage.download_root was empty; using {}",
            defaults::DEFAULT_DOWNLOAD_ROOT
        ));
        config.storage.download_root = PathBuf::from(defaults::DEFAULT_DOWNLOAD_ROOT);
    }
    if config
        .storage
        .resume_dir
        .as_ref()
        .is_some_and(|dir| dir.as_os_str().is_empty())
    {
        warnings.push("storage.resume_dir was empty; using the download root default".to_string());
        config.storage.resume_dir = None;
    }

    let transfer = &mut config.transfer;
    non_zero(
        "transfer.metadata_timeout_secs",
        &mut transfer.metadata_timeout_secs,
        defaults::METADATA_TIMEOUT_SECS,
        &mut warnings,
    );
    non_zero(
        "transfer.metadata_poll_secs",
        &mut transfer.metadata_poll_secs,
        defaults::METADATA_POLL_SECS,
        &mut warnings,
    );
    non_zero(
        "transfer.download_poll_secs",
        &mut transfer.download_poll_secs,
        defaults::DOWNLOAD_POLL_SECS,
        &mut warnings,
    );
    non_zero(
        "transfer.checkpoint_interval_secs",
        &mut transfer.checkpoint_interval_secs,
        defaults::CHECKPOINT_INTERVAL_SECS,
        &mut warnings,
    );
    if !transfer.space_margin.is_finite() || transfer.space_margin < 1.0 {
        warnings.push(format!(
            "transfer.space_margin {} is below 1.0; using {}",
            transfer.space_margin,
            defaults::SPACE_MARGIN
        ));
        transfer.space_margin = defaults::SPACE_MARGIN;
    } else if transfer.space_margin > defaults::MAX_SPACE_MARGIN {
        warnings.push(format!(
            "transfer.space_margin {} exceeds guard rail; clamping to {}",
            transfer.space_margin,
            defaults::MAX_SPACE_MARGIN
        ));
        transfer.space_margin = defaults::MAX_SPACE_MARGIN;
    }
    let mut trackers: Vec<String> = Vec::with_capacity(transfer.trackers.len());
    for tracker in &transfer.trackers {
        let tracker = tracker.trim();
        if tracker.is_empty() || trackers.iter().any(|known| known == tracker) {
            continue;
        }
        trackers.push(tracker.to_string());
    }
    if trackers.len() != transfer.trackers.len() {
        warnings.push(format!(
            "transfer.trackers dropped {} blank or duplicate entries",
            transfer.trackers.len() - trackers.len()
        ));
    }
    transfer.trackers = trackers;

    let upload = &mut config.upload;
    if upload.folder.trim().is_empty() {
        warnings.push(format!(
            "upload.folder was empty; using {}",
            defaults::DRIVE_FOLDER
        ));
        upload.folder = defaults::DRIVE_FOLDER.to_string();
    } else {
        upload.folder = upload.folder.trim().to_string();
    }
    if upload.chunk_size_bytes == 0 {
        warnings.push(format!(
            "upload.chunk_size_bytes was 0; using {}",
            defaults::CHUNK_SIZE_BYTES
        ));
        upload.chunk_size_bytes = defaults::CHUNK_SIZE_BYTES;
    } else if upload.chunk_size_bytes % defaults::CHUNK_ALIGNMENT != 0 {
        let aligned = upload
            .chunk_size_bytes
            .div_ceil(defaults::CHUNK_ALIGNMENT)
            .saturating_mul(defaults::CHUNK_ALIGNMENT);
        warnings.push(format!(
            "upload.chunk_size_bytes {} is not a multiple of {}; rounding up to {aligned}",
            upload.chunk_size_bytes,
            defaults::CHUNK_ALIGNMENT
        ));
        upload.chunk_size_bytes = aligned;
    }
    if upload.progress_step == 0 || upload.progress_step > 100 {
        warnings.push(format!(
            "upload.progress_step {} is outside 1..=100; using {}",
            upload.progress_step,
            defaults::PROGRESS_STEP
        ));
        upload.progress_step = defaults::PROGRESS_STEP;
    }
    if upload.api_base.trim().is_empty() {
        warnings.push("upload.api_base was empty; using the public endpoint".to_string());
        upload.api_base = defaults::DRIVE_API_BASE.to_string();
    }

    if config.workers == 0 {
        warnings.push(format!("workers was 0; using {}", defaults::WORKERS));
        config.workers = defaults::WORKERS;
    } else if config.workers > defaults::MAX_WORKERS {
        warnings.push(format!(
            "workers {} exceeds guard rail; clamping to {}",
            config.workers,
            defaults::MAX_WORKERS
        ));
        config.workers = defaults::MAX_WORKERS;
    }

    if config.logging.level.trim().is_empty() {
        warnings.push(format!("logging.level was empty; using {}", defaults::LOG_LEVEL));
        config.logging.level = defaults::LOG_LEVEL.to_string();
    }
    if let Some(format) = config.logging.format.clone() {
        let lowered = format.trim().to_ascii_lowercase();
        if lowered == "json" || lowered == "pretty" {
            config.logging.format = Some(lowered);
        } else {
            warnings.push(format!(
                "unknown logging.format '{format}'; inferring from build"
            ));
            config.logging.format = None;
        }
    }

    (config, warnings)
}

fn non_zero(field: &str, value: &mut u64, fallback: u64, warnings: &mut Vec<String>) {
    if *value == 0 {
        warnings.push(format!("{field} was 0; using {fallback}"));
        *value = fallback;
    }
}
