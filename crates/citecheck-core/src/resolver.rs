//! Citation resolution: decide which catalog query a reference gets and
//! collect the raw candidates.
//!
//! A reference with an identifier gets exactly one point lookup and never
//! falls back to a title search, even when the lookup misses. A reference
//! without an identifier gets at most one bounded title search.

use std::sync::Arc;

use crate::catalog::{Catalog, CatalogEntry, CatalogError};
use crate::rate_limit::CatalogLimiter;
use crate::{DEFAULT_SEARCH_ROWS, ReferenceRecord};

/// What the catalog said about one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The identifier resolved to `entry`.
    IdentifierMatch {
        identifier: String,
        entry: CatalogEntry,
    },
    /// The identifier is unknown to the catalog. Terminal.
    IdentifierMissing { identifier: String },
    /// Neither identifier nor title: nothing was queried.
    NoQuery,
    /// Title search results, in the order the catalog returned them.
    TitleSearch { candidates: Vec<CatalogEntry> },
}

impl Resolution {
    /// Whether any candidate came back.
    pub fn found(&self) -> bool {
        match self {
            Resolution::IdentifierMatch { .. } => true,
            Resolution::TitleSearch { candidates } => !candidates.is_empty(),
            Resolution::IdentifierMissing { .. } | Resolution::NoQuery => false,
        }
    }
}

/// Issues catalog queries for references.
pub struct Resolver {
    catalog: Arc<dyn Catalog>,
    rows: usize,
    limiter: Option<Arc<CatalogLimiter>>,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            rows: DEFAULT_SEARCH_ROWS,
            limiter: None,
        }
    }

    /// Set the title-search result cap (at least 1).
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows.max(1);
        self
    }

    pub fn with_limiter(mut self, limiter: Option<Arc<CatalogLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn catalog_name(&self) -> &str {
        self.catalog.name()
    }

    /// Resolve one reference with at most one catalog call.
    pub async fn resolve(&self, reference: &ReferenceRecord) -> Result<Resolution, CatalogError> {
        if let Some(identifier) = reference.identifier() {
            self.pace().await;
            let entry = self.catalog.lookup(identifier).await?;
            return Ok(match entry {
                Some(entry) => Resolution::IdentifierMatch {
                    identifier: identifier.to_string(),
                    entry,
                },
                None => Resolution::IdentifierMissing {
                    identifier: identifier.to_string(),
                },
            });
        }

        let Some(title) = reference.title() else {
            return Ok(Resolution::NoQuery);
        };

        self.pace().await;
        let mut candidates = self.catalog.search(title, self.rows).await?;
        candidates.truncate(self.rows);
        Ok(Resolution::TitleSearch { candidates })
    }

    async fn pace(&self) {
        if let Some(ref limiter) = self.limiter {
            limiter.acquire().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock::{MockCatalog, MockSearch};

    fn record(title: &str, identifier: &str) -> ReferenceRecord {
        ReferenceRecord::new(title, "", identifier, vec![])
    }

    #[tokio::test]
    async fn identifier_hit_uses_lookup_only() {
        let mock = Arc::new(
            MockCatalog::new().with_entry("10.1/abc", CatalogEntry::new("X", "10.1/abc")),
        );
        let resolver = Resolver::new(mock.clone());

        let res = resolver.resolve(&record("X", "10.1/abc")).await.unwrap();
        assert_eq!(
            res,
            Resolution::IdentifierMatch {
                identifier: "10.1/abc".into(),
                entry: CatalogEntry::new("X", "10.1/abc"),
            }
        );
        assert!(res.found());
        assert_eq!(mock.lookup_count(), 1);
        assert_eq!(mock.search_count(), 0);
    }

    #[tokio::test]
    async fn identifier_miss_never_falls_back_to_search() {
        let mock = Arc::new(MockCatalog::new().with_search(MockSearch::Results(vec![
            CatalogEntry::new("Y", "10.1/other"),
        ])));
        let resolver = Resolver::new(mock.clone());

        let res = resolver.resolve(&record("Y", "10.1/missing")).await.unwrap();
        assert_eq!(
            res,
            Resolution::IdentifierMissing {
                identifier: "10.1/missing".into()
            }
        );
        assert!(!res.found());
        assert_eq!(mock.search_count(), 0);
    }

    #[tokio::test]
    async fn identifier_is_trimmed() {
        let mock = Arc::new(
            MockCatalog::new().with_entry("10.1/abc", CatalogEntry::new("X", "10.1/abc")),
        );
        let resolver = Resolver::new(mock.clone());
        let r = ReferenceRecord {
            raw: String::new(),
            title: String::new(),
            year: String::new(),
            identifier: "  10.1/abc \n".into(),
            authors: vec![],
        };
        let res = resolver.resolve(&r).await.unwrap();
        assert!(matches!(res, Resolution::IdentifierMatch { .. }));
    }

    #[tokio::test]
    async fn whitespace_identifier_goes_to_title_search() {
        let mock = Arc::new(MockCatalog::new());
        let resolver = Resolver::new(mock.clone());
        let r = ReferenceRecord {
            identifier: "   ".into(),
            title: "Some Title".into(),
            ..Default::default()
        };
        resolver.resolve(&r).await.unwrap();
        assert_eq!(mock.lookup_count(), 0);
        assert_eq!(mock.search_count(), 1);
        assert_eq!(mock.searched_titles(), vec!["Some Title".to_string()]);
    }

    #[tokio::test]
    async fn empty_record_makes_no_calls() {
        let mock = Arc::new(MockCatalog::new());
        let resolver = Resolver::new(mock.clone());
        let res = resolver.resolve(&ReferenceRecord::default()).await.unwrap();
        assert_eq!(res, Resolution::NoQuery);
        assert_eq!(mock.lookup_count() + mock.search_count(), 0);
    }

    #[tokio::test]
    async fn search_is_capped_at_rows() {
        let entries: Vec<_> = (0..8)
            .map(|i| CatalogEntry::new(format!("T{i}"), format!("10.1/{i}")))
            .collect();
        let mock = Arc::new(MockCatalog::new().with_search(MockSearch::Results(entries)));
        let resolver = Resolver::new(mock.clone()).with_rows(3);

        let res = resolver.resolve(&record("T", "")).await.unwrap();
        match res {
            Resolution::TitleSearch { candidates } => {
                assert_eq!(candidates.len(), 3);
                assert_eq!(candidates[0].title.as_deref(), Some("T0"));
            }
            other => panic!("expected TitleSearch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let mock = Arc::new(MockCatalog::new().with_search(MockSearch::Status(500)));
        let resolver = Resolver::new(mock);
        let err = resolver.resolve(&record("T", "")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Status(500)));
    }

    #[test]
    fn rows_floor_is_one() {
        let resolver = Resolver::new(Arc::new(MockCatalog::new())).with_rows(0);
        assert_eq!(resolver.rows(), 1);
    }
}
