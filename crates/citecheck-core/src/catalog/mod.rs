//! Catalog backend trait and implementations for resolving references.

pub mod crossref;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use crossref::CrossRef;

/// A candidate work returned by a catalog. Only two fields are ever read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: Option<String>,
    pub identifier: Option<String>,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            identifier: Some(identifier.into()),
        }
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned HTTP {0}")]
    Status(u16),
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

/// Boxed future returned by [`Catalog`] operations.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CatalogError>> + Send + 'a>>;

/// A bibliographic catalog that can resolve identifiers and search titles.
///
/// Both operations are read-only. A lookup that the service answers with a
/// non-success status is `Ok(None)`; a search that does the same is an error.
pub trait Catalog: Send + Sync {
    /// The canonical name of this catalog (e.g., "CrossRef").
    fn name(&self) -> &str;

    /// Point lookup by persistent identifier.
    fn lookup<'a>(&'a self, identifier: &'a str) -> CatalogFuture<'a, Option<CatalogEntry>>;

    /// Free-text title search returning at most `rows` entries in relevance order.
    fn search<'a>(&'a self, title: &'a str, rows: usize) -> CatalogFuture<'a, Vec<CatalogEntry>>;
}
