use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use citecheck_core::{ReferenceRecord, Verdict, VerdictStatus};
use serde::{Deserialize, Serialize};

use crate::ReportError;

/// One line of the results stream.
///
/// Variants are distinguished by their fields, so the JSON carries no tag:
/// a verdict line has `verdict`, a reference failure has `ref_index` and
/// `error`, a document failure has only `pdf_file` and `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Verdict {
        pdf_file: String,
        ref_index: usize,
        #[serde(rename = "ref")]
        reference: ReferenceRecord,
        verdict: Verdict,
    },
    ReferenceError {
        pdf_file: String,
        ref_index: usize,
        #[serde(rename = "ref")]
        reference: ReferenceRecord,
        error: String,
    },
    DocumentError {
        pdf_file: String,
        error: String,
    },
}

impl OutputRecord {
    pub fn pdf_file(&self) -> &str {
        match self {
            OutputRecord::Verdict { pdf_file, .. }
            | OutputRecord::ReferenceError { pdf_file, .. }
            | OutputRecord::DocumentError { pdf_file, .. } => pdf_file,
        }
    }

    pub fn status(&self) -> Option<VerdictStatus> {
        match self {
            OutputRecord::Verdict { verdict, .. } => Some(verdict.status),
            _ => None,
        }
    }
}

/// Line-oriented JSON writer. Every record is flushed as soon as it is
/// written, so an interrupted run leaves a valid prefix behind.
pub struct JsonlWriter<W: Write> {
    out: W,
    written: usize,
}

impl JsonlWriter<BufWriter<File>> {
    /// Create (or truncate) `path`, creating its parent directory first.
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write(&mut self, record: &OutputRecord) -> Result<(), ReportError> {
        let line = serde_json::to_string(record).map_err(|source| ReportError::Json {
            line: self.written + 1,
            source,
        })?;
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Parse a results stream. Blank lines are skipped.
pub fn parse_records(reader: impl BufRead) -> Result<Vec<OutputRecord>, ReportError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| ReportError::Json {
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_records(path: &Path) -> Result<Vec<OutputRecord>, ReportError> {
    let file = File::open(path)?;
    parse_records(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(status: VerdictStatus) -> Verdict {
        Verdict {
            status,
            score: 100,
            match_title: "X".into(),
            match_identifier: "10.1/x".into(),
            reason: "identifier resolved in catalog".into(),
        }
    }

    #[test]
    fn verdict_line_shape() {
        let record = OutputRecord::Verdict {
            pdf_file: "a.pdf".into(),
            ref_index: 3,
            reference: ReferenceRecord::new("X", "2020", "10.1/x", vec![]),
            verdict: verdict(VerdictStatus::FoundByIdentifier),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pdf_file"], "a.pdf");
        assert_eq!(json["ref_index"], 3);
        assert_eq!(json["ref"]["doi"], "10.1/x");
        assert_eq!(json["ref"]["raw"], "X | 2020 | 10.1/x");
        assert_eq!(json["verdict"]["status"], "FOUND_BY_IDENTIFIER");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn document_error_line_shape() {
        let record = OutputRecord::DocumentError {
            pdf_file: "b.pdf".into(),
            error: "conversion service returned status 500".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"pdf_file":"b.pdf","error":"conversion service returned status 500"}"#
        );
    }

    #[test]
    fn variants_are_told_apart_when_parsing() {
        let input = r#"{"pdf_file":"a.pdf","ref_index":0,"ref":{"raw":"T","title":"T","year":"","doi":"","authors":[]},"verdict":{"status":"NOT_FOUND","score":12,"match_title":"","match_doi":"","reason":"no catalog candidate matched the title"}}

{"pdf_file":"a.pdf","ref_index":1,"ref":{"raw":"U","title":"U","year":"","doi":"","authors":[]},"error":"catalog returned status 503"}
{"pdf_file":"b.pdf","error":"timed out"}
"#;
        let records = parse_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status(), Some(VerdictStatus::NotFound));
        assert!(matches!(records[1], OutputRecord::ReferenceError { ref_index: 1, .. }));
        assert!(matches!(records[2], OutputRecord::DocumentError { .. }));
        assert_eq!(records[2].pdf_file(), "b.pdf");
    }

    #[test]
    fn legacy_python_lines_parse() {
        let input = r#"{"pdf_file": "p.pdf", "ref_index": 0, "ref": {"raw": "T | 10.1/t", "title": "T", "year": "", "doi": "10.1/t", "authors": []}, "verdict": {"status": "FOUND_BY_DOI", "score": 100.0, "match_title": "T", "match_doi": null, "reason": "DOI resolved in Crossref"}}
{"pdf_file": "p.pdf", "ref_index": 1, "ref": {"raw": "Graph nets", "title": "Graph nets", "year": "", "doi": "", "authors": []}, "verdict": {"status": "FOUND_BY_TITLE_MED", "score": 85.71428571428571, "match_title": "Graph networks", "match_doi": "10.1/g", "reason": "Best fuzzy title match from Crossref search"}}
{"pdf_file": "p.pdf", "ref_index": 2, "ref": {"raw": "10.1/x", "title": "", "year": "", "doi": "10.1/x", "authors": []}, "verdict": {"status": "DOI_NOT_FOUND", "score": 0, "match_title": "", "match_doi": "10.1/x", "reason": "DOI did not resolve in Crossref"}}
"#;
        let records = parse_records(input.as_bytes()).unwrap();
        let statuses: Vec<_> = records.iter().map(OutputRecord::status).collect();
        assert_eq!(
            statuses,
            vec![
                Some(VerdictStatus::FoundByIdentifier),
                Some(VerdictStatus::FoundByTitleMed),
                Some(VerdictStatus::IdentifierNotFound),
            ]
        );
        match &records[1] {
            OutputRecord::Verdict { verdict, .. } => assert_eq!(verdict.score, 85),
            other => panic!("expected a verdict, got {other:?}"),
        }
    }

    #[test]
    fn bad_line_reports_line_number() {
        let input = "{\"pdf_file\":\"b.pdf\",\"error\":\"x\"}\nnot json\n";
        match parse_records(input.as_bytes()) {
            Err(ReportError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn writer_creates_parent_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs").join("results.jsonl");
        let records = vec![
            OutputRecord::Verdict {
                pdf_file: "a.pdf".into(),
                ref_index: 0,
                reference: ReferenceRecord::new("Café Society", "", "", vec!["Ana Núñez".into()]),
                verdict: verdict(VerdictStatus::FoundByTitleHigh),
            },
            OutputRecord::DocumentError {
                pdf_file: "b.pdf".into(),
                error: "boom".into(),
            },
        ];

        let mut writer = JsonlWriter::create(&path).unwrap();
        for r in &records {
            writer.write(r).unwrap();
        }
        assert_eq!(writer.written(), 2);
        drop(writer);

        let text = std::fs::read_to_string(&path).unwrap();
        // Non-ASCII is written as-is
        assert!(text.contains("Café Society"));
        assert_eq!(text.lines().count(), 2);
        assert_eq!(read_records(&path).unwrap(), records);
    }
}
