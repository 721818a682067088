use std::io::{self, Write};
use std::path::Path;

use color_eyre::Result;
use dirsize_core::{SizeProgress, SizeReport, Units, format_count, format_size_with};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_report(
    root: &Path,
    report: &SizeReport,
    format: OutputFormat,
    units: Units,
) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Text => {
            writeln!(
                out,
                "{}\t{} files\t{}",
                format_size_with(report.result.size, units),
                format_count(report.result.count),
                root.display()
            )?;
        }
        OutputFormat::Json => {
            let totals = report.totals();
            let value = json!({
                "path": root,
                "size": report.result.size,
                "count": report.result.count,
                "directories": totals.dirs_processed,
                "workers": report.workers.len(),
                "elapsed_ms": report.elapsed.as_millis() as u64,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
    }

    Ok(())
}

/// Overwrite the current stderr line with a progress summary
pub fn print_progress(progress: &SizeProgress, units: Units) {
    let mut err = io::stderr().lock();
    let _ = write!(
        err,
        "\r[{:>6.1}s] {} in {} files, {} dirs done, {} pending, {} busy   ",
        progress.elapsed.as_secs_f64(),
        format_size_with(progress.bytes, units),
        format_count(progress.files),
        format_count(progress.dirs_done),
        format_count(progress.pending as u64),
        progress.busy_workers,
    );
    let _ = err.flush();
}
