//! In-memory catalog for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Catalog, CatalogEntry, CatalogError, CatalogFuture};

/// A configurable mock search response for [`MockCatalog`].
#[derive(Clone, Debug)]
pub enum MockSearch {
    /// Return these candidates (truncated to the requested row count).
    Results(Vec<CatalogEntry>),
    /// Simulate a non-success HTTP status.
    Status(u16),
    /// Simulate a malformed body.
    Malformed(String),
}

/// A hand-rolled mock implementing [`Catalog`] for tests.
///
/// Supports:
/// - A fixed map of identifiers to entries for lookups (missing → not found).
/// - A fixed search response, or one per title.
/// - Optional per-call latency.
/// - Call counting via [`lookup_count()`](MockCatalog::lookup_count) and
///   [`search_count()`](MockCatalog::search_count).
pub struct MockCatalog {
    entries: HashMap<String, CatalogEntry>,
    searches: HashMap<String, MockSearch>,
    fallback_search: MockSearch,
    delay: Option<Duration>,
    lookup_calls: AtomicUsize,
    search_calls: AtomicUsize,
    searched_titles: Mutex<Vec<String>>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    /// An empty catalog: every lookup misses and every search returns nothing.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            searches: HashMap::new(),
            fallback_search: MockSearch::Results(vec![]),
            delay: None,
            lookup_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            searched_titles: Mutex::new(Vec::new()),
        }
    }

    /// Make `identifier` resolve to `entry`.
    pub fn with_entry(mut self, identifier: &str, entry: CatalogEntry) -> Self {
        self.entries.insert(identifier.to_string(), entry);
        self
    }

    /// Response for searches whose title matches no [`with_search_for`](Self::with_search_for).
    pub fn with_search(mut self, response: MockSearch) -> Self {
        self.fallback_search = response;
        self
    }

    /// Response for searches on exactly `title`.
    pub fn with_search_for(mut self, title: &str, response: MockSearch) -> Self {
        self.searches.insert(title.to_string(), response);
        self
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `lookup()` has been called.
    pub fn lookup_count(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// How many times `search()` has been called.
    pub fn search_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Titles passed to `search()`, in call order.
    pub fn searched_titles(&self) -> Vec<String> {
        self.searched_titles
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl Catalog for MockCatalog {
    fn name(&self) -> &str {
        "Mock"
    }

    fn lookup<'a>(&'a self, identifier: &'a str) -> CatalogFuture<'a, Option<CatalogEntry>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.entries.get(identifier).cloned();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            Ok(entry)
        })
    }

    fn search<'a>(&'a self, title: &'a str, rows: usize) -> CatalogFuture<'a, Vec<CatalogEntry>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut titles) = self.searched_titles.lock() {
            titles.push(title.to_string());
        }
        let response = self
            .searches
            .get(title)
            .unwrap_or(&self.fallback_search)
            .clone();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockSearch::Results(mut entries) => {
                    entries.truncate(rows);
                    Ok(entries)
                }
                MockSearch::Status(code) => Err(CatalogError::Status(code)),
                MockSearch::Malformed(msg) => Err(CatalogError::Malformed(msg)),
            }
        })
    }
}
