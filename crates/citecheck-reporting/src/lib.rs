//! Output records, batch summaries and summary export.

use thiserror::Error;

pub mod export;
pub mod records;
pub mod summary;

pub use export::{export_summary_csv, summary_csv};
pub use records::{JsonlWriter, OutputRecord, parse_records, read_records};
pub use summary::{BatchSummary, DocumentSummary, StatusCounts};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
