use std::io::Write;

use citecheck_core::{ReferenceRecord, VerdictStatus};
use citecheck_reporting::BatchSummary;
use owo_colors::OwoColorize;

const RULE: &str = "────────────────────────────────────";

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn colored_status(status: VerdictStatus, color: ColorMode) -> String {
    if !color.enabled() {
        return status.to_string();
    }
    match status {
        VerdictStatus::FoundByIdentifier | VerdictStatus::FoundByTitleHigh => {
            status.green().to_string()
        }
        VerdictStatus::FoundByTitleMed => status.yellow().to_string(),
        VerdictStatus::IdentifierNotFound | VerdictStatus::NotFound => status.red().to_string(),
        VerdictStatus::NoTitle => status.dimmed().to_string(),
    }
}

fn count_line(
    w: &mut dyn Write,
    label: &str,
    n: usize,
    paint: impl Fn(&str) -> String,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() && n > 0 {
        writeln!(w, "   {}: {}", paint(label), n)
    } else {
        writeln!(w, "   {}: {}", label, n)
    }
}

/// Print per-document bucket counts followed by the overall totals.
pub fn print_summary(
    w: &mut dyn Write,
    summary: &BatchSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    if summary.documents.is_empty() {
        writeln!(w, "No reference data found.")?;
        return Ok(());
    }

    writeln!(w)?;
    writeln!(w, "Processed PDFs: {}", summary.documents.len())?;
    writeln!(w, "{}", RULE)?;

    for doc in &summary.documents {
        if color.enabled() {
            writeln!(w, "{}", doc.pdf_file.bold())?;
        } else {
            writeln!(w, "{}", doc.pdf_file)?;
        }

        if let Some(ref error) = doc.document_error {
            if color.enabled() {
                writeln!(w, "  {} {}", "FAILED:".red().bold(), error)?;
            } else {
                writeln!(w, "  FAILED: {}", error)?;
            }
            writeln!(w, "{}", RULE)?;
            continue;
        }

        writeln!(w, "  References found: {}", doc.references())?;
        count_line(w, "FOUND", doc.counts.found(), |s| s.green().to_string(), color)?;
        count_line(
            w,
            "PARTIAL / LOW MATCH",
            doc.counts.partial(),
            |s| s.yellow().to_string(),
            color,
        )?;
        count_line(w, "NOT FOUND", doc.counts.not_found(), |s| s.red().to_string(), color)?;
        if doc.counts.no_title() > 0 {
            count_line(w, "NO TITLE", doc.counts.no_title(), |s| s.dimmed().to_string(), color)?;
        }
        if doc.reference_errors > 0 {
            count_line(w, "ERRORS", doc.reference_errors, |s| s.red().to_string(), color)?;
        }
        writeln!(w, "{}", RULE)?;
    }

    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "Overall summary".bold())?;
    } else {
        writeln!(w, "Overall summary")?;
    }
    writeln!(w, "  Total PDFs: {}", summary.documents.len())?;
    writeln!(w, "  Total references: {}", summary.total_references())?;
    for (status, n) in summary.totals.iter() {
        writeln!(w, "  {}: {}", colored_status(status, color), n)?;
    }
    if summary.total_errors() > 0 {
        writeln!(
            w,
            "  Errors: {} ({} failed documents)",
            summary.total_errors(),
            summary.failed_documents()
        )?;
    }
    Ok(())
}

/// Print references extracted from a TEI file.
pub fn print_extracted(
    w: &mut dyn Write,
    file_name: &str,
    refs: &[ReferenceRecord],
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {} ({} references)\n",
            "DRY RUN:".bold().cyan(),
            file_name.bold(),
            refs.len()
        )?;
    } else {
        writeln!(w, "DRY RUN: {} ({} references)\n", file_name, refs.len())?;
    }

    for (i, r) in refs.iter().enumerate() {
        if color.enabled() {
            writeln!(w, "{}", format!("[{}]", i + 1).bold().yellow())?;
        } else {
            writeln!(w, "[{}]", i + 1)?;
        }

        if r.title.is_empty() {
            if color.enabled() {
                writeln!(w, "  Title:   {}", "(none)".red())?;
            } else {
                writeln!(w, "  Title:   (none)")?;
            }
        } else {
            writeln!(w, "  Title:   {}", r.title)?;
        }
        writeln!(
            w,
            "  Authors: {}",
            if r.authors.is_empty() {
                "(none)".to_string()
            } else {
                r.authors.join("; ")
            }
        )?;
        if !r.year.is_empty() {
            writeln!(w, "  Year:    {}", r.year)?;
        }
        if !r.identifier.is_empty() {
            writeln!(w, "  DOI:     {}", r.identifier)?;
        }
        writeln!(w)?;
    }

    writeln!(w, "Total: {} references", refs.len())?;
    Ok(())
}
