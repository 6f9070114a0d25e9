//! Document ingestion: PDF discovery and GROBID conversion to TEI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub use citecheck_core::{Config, ReferenceRecord};
pub use citecheck_tei::ExtractError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("conversion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TEI extraction error: {0}")]
    Extract(#[from] ExtractError),
}

const FULLTEXT_ENDPOINT: &str = "/api/processFulltextDocument";

/// Longest error body kept in [`IngestError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Client for a GROBID server's full-text conversion endpoint.
pub struct GrobidClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl GrobidClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self::new(config.grobid_url.clone(), client, config.conversion_timeout())
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, FULLTEXT_ENDPOINT)
    }

    /// Convert a PDF on disk to TEI XML.
    pub async fn convert(&self, pdf: &Path) -> Result<String, IngestError> {
        let bytes = tokio::fs::read(pdf).await?;
        self.convert_bytes(pdf_file_name(pdf), bytes).await
    }

    /// Upload PDF bytes as the multipart `input` field and return the TEI body.
    pub async fn convert_bytes(
        &self,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<String, IngestError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("input", part);

        let url = self.endpoint();
        tracing::debug!(%url, "grobid conversion");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;
        parse_conversion_response(resp).await
    }
}

/// Interpret a conversion response: the TEI text on success, an error otherwise.
pub async fn parse_conversion_response(resp: reqwest::Response) -> Result<String, IngestError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(IngestError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }
    Ok(body)
}

/// File name used to tag a document's output records.
pub fn pdf_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// List the PDFs directly inside `dir`, sorted by file name.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_pdf(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort_by_key(|p| pdf_file_name(p));
    tracing::info!(dir = %dir.display(), count = pdfs.len(), "discovered PDFs");
    Ok(pdfs)
}

/// Convert one PDF and extract its references.
pub async fn ingest_document(
    grobid: &GrobidClient,
    pdf: &Path,
) -> Result<Vec<ReferenceRecord>, IngestError> {
    tracing::info!(pdf = %pdf.display(), "converting document");
    let tei = grobid.convert(pdf).await?;
    let refs = citecheck_tei::extract_references(&tei)?;
    tracing::info!(pdf = %pdf.display(), references = refs.len(), "references extracted");
    Ok(refs)
}
