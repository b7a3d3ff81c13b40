//! Human-readable output for scans, per-file results and batch summaries.
//!
//! Formatting functions return strings so they can be tested; the `print_*`
//! functions send them through the logger.

use crate::batch::{BatchSummary, ScanReport};
use crate::constants::{KIB, MIB, PROGRESS_BAR_TEMPLATE};
use crate::error::{CompressionError, Result};
use crate::job::{CompressionResult, Outcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Format file size in human-readable format
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 KB")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Size reduction as a percentage; negative when the file grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}

/// Parse a size such as `100k`, `1.5M` or `2048b` into bytes.
///
/// A number without a unit is taken as KiB.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim().to_ascii_lowercase();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let multiplier = match unit.trim() {
        "" | "k" | "kb" | "kib" => KIB,
        "b" => 1,
        "m" | "mb" | "mib" => MIB,
        other => {
            return Err(CompressionError::InvalidTargetSize(format!(
                "unknown unit '{}' in '{}'",
                other, input
            )))
        }
    };

    let value: f64 = number
        .parse()
        .map_err(|_| CompressionError::InvalidTargetSize(format!("'{}' is not a size", input)))?;
    let bytes = (value * multiplier as f64).round();
    if !bytes.is_finite() || bytes < 1.0 {
        return Err(CompressionError::InvalidTargetSize(format!(
            "'{}' must be at least one byte",
            input
        )));
    }

    Ok(bytes as u64)
}

pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

pub fn format_scan_report(report: &ScanReport) -> String {
    let mut out = format!(
        "📁 Found {} image file(s), {} total",
        report.total_files,
        format_file_size(report.total_bytes)
    );
    for (ext, count) in &report.by_extension {
        let label = if ext.is_empty() { "(none)" } else { ext.as_str() };
        out.push_str(&format!("\n  .{:<6} {}", label, count));
    }
    out
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One line per file, e.g. `✅ photo.png -> photo.jpg 2.1 MB -> 98.4 KB (q 71)`.
pub fn format_result_line(result: &CompressionResult) -> String {
    let name = display_name(&result.source);
    match &result.outcome {
        Outcome::Failed(reason) => format!("{} {}: {}", result.outcome.symbol(), name, reason),
        outcome => {
            let mut line = format!("{} {}", outcome.symbol(), name);
            if outcome.wrote_output() && result.output != result.source {
                line.push_str(&format!(" -> {}", display_name(&result.output)));
            }
            line.push_str(&format!(
                " {} -> {}",
                format_file_size(result.original_size),
                format_file_size(result.final_size)
            ));
            if let Some(quality) = result.final_quality {
                line.push_str(&format!(" (q {})", quality));
            }
            if !outcome.wrote_output() {
                line.push_str(&format!(" [{}]", outcome));
            } else if matches!(outcome, Outcome::BestEffort) {
                line.push_str(" [over target]");
            }
            line
        }
    }
}

pub fn format_results_table(results: &[CompressionResult]) -> String {
    let width = results
        .iter()
        .map(|r| display_name(&r.source).chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut out = format!(
        "{:<width$}  {:>10}  {:>10}  {:>7}  {:>4}  {}",
        "File",
        "Before",
        "After",
        "Saved",
        "Q",
        "Status",
        width = width
    );
    for result in results {
        let (after, saved, quality) = if result.is_success() {
            (
                format_file_size(result.final_size),
                format!(
                    "{:.1}%",
                    calculate_compression_ratio(result.original_size, result.final_size)
                ),
                result
                    .final_quality
                    .map(|q| q.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            )
        } else {
            ("-".to_string(), "-".to_string(), "-".to_string())
        };
        let before = if result.original_size > 0 {
            format_file_size(result.original_size)
        } else {
            "-".to_string()
        };
        out.push_str(&format!(
            "\n{:<width$}  {:>10}  {:>10}  {:>7}  {:>4}  {} {}",
            display_name(&result.source),
            before,
            after,
            saved,
            quality,
            result.outcome.symbol(),
            result.outcome,
            width = width
        ));
    }
    out
}

pub fn format_summary(summary: &BatchSummary) -> String {
    let mut out = format!(
        "📊 {} succeeded, {} failed in {:.2}s ({:.1} files/s)",
        summary.succeeded,
        summary.failed,
        summary.elapsed.as_secs_f64(),
        summary.files_per_second()
    );
    if summary.bytes_before > 0 {
        out.push_str(&format!(
            "\n📦 {} -> {} ({:.1}% smaller)",
            format_file_size(summary.bytes_before),
            format_file_size(summary.bytes_after),
            calculate_compression_ratio(summary.bytes_before, summary.bytes_after)
        ));
    }
    if summary.cancelled {
        out.push_str(&format!(
            "\n🛑 Cancelled, {} file(s) not processed",
            summary.skipped()
        ));
    }
    out
}

pub fn print_scan_report(report: &ScanReport) {
    crate::info!("{}", format_scan_report(report));
}

pub fn print_results_table(results: &[CompressionResult]) {
    if !results.is_empty() {
        crate::info!("{}", format_results_table(results));
    }
}

pub fn print_summary(summary: &BatchSummary) {
    crate::info!("{}", format_summary(summary));
}
