use std::io::{self, Write};

use colored::Colorize;
use indicatif::HumanBytes;
use serde::Serialize;

use crate::duplicates::{ScanOutcome, SkippedFile};
use crate::housekeeping::{CleanReport, SortReport};

/// Writes the deleted paths, one per line, then any skipped files with the
/// reason they were skipped.
pub fn write_scan_outcome<W: Write>(out: &mut W, outcome: &ScanOutcome) -> io::Result<()> {
    if outcome.deleted.is_empty() {
        writeln!(out, "{}", "No duplicate files found!".green())?;
    } else {
        let verb = if outcome.dry_run { "Would delete" } else { "Deleted" };
        writeln!(
            out,
            "{}",
            format!(
                "{} {} duplicate files ({})",
                verb,
                outcome.deleted.len(),
                HumanBytes(outcome.deleted.bytes_reclaimed())
            )
            .yellow()
        )?;
        for path in &outcome.deleted {
            writeln!(out, "  {}", path.display())?;
        }
    }
    write_skipped(out, &outcome.skipped)?;
    if outcome.interrupted {
        writeln!(out, "{}", "Scan interrupted before it finished.".red())?;
    }
    Ok(())
}

pub fn write_clean_report<W: Write>(out: &mut W, report: &CleanReport) -> io::Result<()> {
    let verb = if report.dry_run { "Would remove" } else { "Removed" };
    writeln!(
        out,
        "{}",
        format!("{} {} files ({})", verb, report.removed.len(), HumanBytes(report.bytes)).green()
    )?;
    write_skipped(out, &report.failed)
}

pub fn write_sort_report<W: Write>(out: &mut W, report: &SortReport) -> io::Result<()> {
    let verb = if report.dry_run { "Would move" } else { "Moved" };
    writeln!(out, "{}", format!("{} {} files", verb, report.moved.len()).green())?;
    for (from, to) in &report.moved {
        writeln!(out, "  {} -> {}", from.display(), to.display())?;
    }
    write_skipped(out, &report.skipped)
}

fn write_skipped<W: Write>(out: &mut W, skipped: &[SkippedFile]) -> io::Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", format!("Skipped {} files:", skipped.len()).red())?;
    for file in skipped {
        match &file.path {
            Some(path) => writeln!(out, "  {}: {}", path.display(), file.reason)?,
            None => writeln!(out, "  {}", file.reason)?,
        }
    }
    Ok(())
}

pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}
