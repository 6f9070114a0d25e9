use std::io::Write;
use std::path::Path;

use crate::ReportError;
use crate::summary::BatchSummary;

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One row per document.
pub fn summary_csv(summary: &BatchSummary) -> String {
    let mut out = String::from("pdf_file,references,found,partial,not_found,no_title,errors\n");
    for doc in &summary.documents {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            csv_escape(&doc.pdf_file),
            doc.references(),
            doc.counts.found(),
            doc.counts.partial(),
            doc.counts.not_found(),
            doc.counts.no_title(),
            doc.errors(),
        ));
    }
    out
}

/// Write [`summary_csv`] to `path`, creating the parent directory.
pub fn export_summary_csv(summary: &BatchSummary, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(summary_csv(summary).as_bytes())?;
    tracing::info!(path = %path.display(), documents = summary.documents.len(), "wrote summary CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::OutputRecord;
    use citecheck_core::{ReferenceRecord, Verdict, VerdictStatus};

    fn records() -> Vec<OutputRecord> {
        vec![
            OutputRecord::Verdict {
                pdf_file: "paper, final.pdf".into(),
                ref_index: 0,
                reference: ReferenceRecord::new("T", "", "", vec![]),
                verdict: Verdict {
                    status: VerdictStatus::FoundByTitleMed,
                    score: 80,
                    match_title: "T'".into(),
                    match_identifier: "10.1/t".into(),
                    reason: String::new(),
                },
            },
            OutputRecord::DocumentError {
                pdf_file: "broken.pdf".into(),
                error: "bad".into(),
            },
        ]
    }

    #[test]
    fn csv_rows() {
        let csv = summary_csv(&BatchSummary::from_records(&records()));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "pdf_file,references,found,partial,not_found,no_title,errors",
                "\"paper, final.pdf\",1,0,1,0,0,0",
                "broken.pdf,0,0,0,0,0,1",
            ]
        );
    }

    #[test]
    fn export_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs").join("summary.csv");
        export_summary_csv(&BatchSummary::from_records(&records()), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("pdf_file,"));
    }
}
