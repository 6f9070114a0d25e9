use std::collections::BTreeMap;

use citecheck_core::VerdictStatus;

use crate::records::OutputRecord;

/// Per-status verdict counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts(BTreeMap<VerdictStatus, usize>);

impl StatusCounts {
    pub fn add(&mut self, status: VerdictStatus) {
        *self.0.entry(status).or_default() += 1;
    }

    pub fn get(&self, status: VerdictStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Identifier hits plus high-confidence title matches.
    pub fn found(&self) -> usize {
        self.get(VerdictStatus::FoundByIdentifier) + self.get(VerdictStatus::FoundByTitleHigh)
    }

    pub fn partial(&self) -> usize {
        self.get(VerdictStatus::FoundByTitleMed)
    }

    pub fn not_found(&self) -> usize {
        self.get(VerdictStatus::IdentifierNotFound) + self.get(VerdictStatus::NotFound)
    }

    pub fn no_title(&self) -> usize {
        self.get(VerdictStatus::NoTitle)
    }

    /// Non-zero counts in status order.
    pub fn iter(&self) -> impl Iterator<Item = (VerdictStatus, usize)> + '_ {
        self.0.iter().map(|(s, n)| (*s, *n)).filter(|(_, n)| *n > 0)
    }

    fn merge(&mut self, other: &StatusCounts) {
        for (status, n) in other.iter() {
            *self.0.entry(status).or_default() += n;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub pdf_file: String,
    pub counts: StatusCounts,
    pub reference_errors: usize,
    /// Set when the document itself could not be processed.
    pub document_error: Option<String>,
}

impl DocumentSummary {
    fn new(pdf_file: &str) -> Self {
        Self {
            pdf_file: pdf_file.to_string(),
            counts: StatusCounts::default(),
            reference_errors: 0,
            document_error: None,
        }
    }

    /// References seen for this document, verified or failed.
    pub fn references(&self) -> usize {
        self.counts.total() + self.reference_errors
    }

    /// Reference failures plus one for a failed document.
    pub fn errors(&self) -> usize {
        self.reference_errors + usize::from(self.document_error.is_some())
    }
}

/// Aggregate view over a results stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// In order of first appearance in the stream.
    pub documents: Vec<DocumentSummary>,
    pub totals: StatusCounts,
}

impl BatchSummary {
    pub fn from_records(records: &[OutputRecord]) -> Self {
        let mut documents: Vec<DocumentSummary> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            let slot = *index
                .entry(record.pdf_file().to_string())
                .or_insert_with(|| {
                    documents.push(DocumentSummary::new(record.pdf_file()));
                    documents.len() - 1
                });
            let doc = &mut documents[slot];
            match record {
                OutputRecord::Verdict { verdict, .. } => doc.counts.add(verdict.status),
                OutputRecord::ReferenceError { .. } => doc.reference_errors += 1,
                OutputRecord::DocumentError { error, .. } => {
                    doc.document_error = Some(error.clone());
                }
            }
        }

        let mut totals = StatusCounts::default();
        for doc in &documents {
            totals.merge(&doc.counts);
        }

        Self { documents, totals }
    }

    pub fn total_references(&self) -> usize {
        self.documents.iter().map(DocumentSummary::references).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.documents.iter().map(DocumentSummary::errors).sum()
    }

    pub fn failed_documents(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| d.document_error.is_some())
            .count()
    }

    /// True when the stream held no verdicts at all.
    pub fn is_empty(&self) -> bool {
        self.totals.total() == 0
    }
}
