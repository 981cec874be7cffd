//! Output renderers and formatting helpers for CLI commands.

use std::path::Path;

use ferry_app::FetchReport;
use ferry_drive::UploadReceipt;
use ferry_fsops::OutputEntry;
use ferry_session::CheckpointInfo;
use ferry_torrent_core::{ContentMetadata, human_bytes};
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::context::{CliResult, json_failure};

fn print_json(value: &Value) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(json_failure)?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_manifest(metadata: &ContentMetadata, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::to_value(metadata).map_err(json_failure)?;
            print_json(&value)?;
        }
        OutputFormat::Table => {
            println!("name: {}", metadata.name);
            println!(
                "size: {} ({} files)",
                human_bytes(metadata.total_bytes),
                metadata.files.len()
            );
            println!("  {:>5} {:>12} path", "index", "size");
            for file in &metadata.files {
                println!(
                    "  {:>5} {:>12} {}",
                    file.index,
                    format_bytes(file.size_bytes),
                    file.relative_path
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn fetch_report_json(report: &FetchReport) -> Value {
    let archive = match &report.archive {
        None => Value::Null,
        Some(Ok(archive)) => json!({
            "path": archive.path,
            "entries_written": archive.entries_written,
            "skipped": archive.skipped,
        }),
        Some(Err(err)) => json!({ "error": err.describe() }),
    };
    json!({
        "content_id": report.content_id.as_str(),
        "name": report.name,
        "selected_bytes": report.selected_bytes,
        "selected_files": report.selected_files,
        "destination": report.destination,
        "archive": archive,
    })
}

pub(crate) fn render_fetch_report(report: &FetchReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&fetch_report_json(report))?,
        OutputFormat::Table => {
            println!("id: {}", report.content_id);
            println!("name: {}", report.name);
            println!(
                "fetched: {} in {} files",
                human_bytes(report.selected_bytes),
                report.selected_files
            );
            println!("destination: {}", report.destination.display());
            match &report.archive {
                Some(Ok(archive)) => println!("archive: {}", archive.path.display()),
                Some(Err(err)) => println!("archive: failed ({})", err.describe()),
                None => {}
            }
        }
    }
    Ok(())
}

pub(crate) fn render_receipt(receipt: &UploadReceipt, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "file_id": receipt.file_id,
            "folder_id": receipt.folder_id,
            "link": receipt.link,
            "bytes": receipt.bytes,
        }))?,
        OutputFormat::Table => {
            println!("file id: {}", receipt.file_id);
            println!("folder id: {}", receipt.folder_id);
            println!("size: {}", format_bytes(receipt.bytes));
            if let Some(link) = &receipt.link {
                println!("link: {link}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_outputs(
    root: &Path,
    entries: &[OutputEntry],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = entries
                .iter()
                .map(|entry| {
                    json!({
                        "path": entry.path,
                        "relative": entry.relative,
                        "size_bytes": entry.size_bytes,
                    })
                })
                .collect();
            print_json(&Value::Array(items))?;
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("no files under {}", root.display());
                return Ok(());
            }
            println!("{:>12} PATH", "SIZE");
            for entry in entries {
                println!(
                    "{:>12} {}",
                    format_bytes(entry.size_bytes),
                    entry.relative.display()
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_checkpoints(infos: &[CheckpointInfo], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = infos
                .iter()
                .map(|info| {
                    json!({
                        "content_id": info.content_id.as_str(),
                        "saved_at": info.saved_at.to_rfc3339(),
                        "payload_bytes": info.payload_bytes,
                        "path": info.path,
                    })
                })
                .collect();
            print_json(&Value::Array(items))?;
        }
        OutputFormat::Table => {
            if infos.is_empty() {
                println!("no checkpoints stored");
                return Ok(());
            }
            println!("{:<40} {:>10} SAVED", "ID", "SIZE");
            for info in infos {
                println!(
                    "{:<40} {:>10} {}",
                    info.content_id,
                    format_bytes(u64::try_from(info.payload_bytes).unwrap_or(u64::MAX)),
                    info.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }
    Ok(())
}

#[must_use]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

#[must_use]
pub(crate) fn format_rate(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
