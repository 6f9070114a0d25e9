use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod catalog;
pub mod checker;
pub mod classifier;
pub mod config_file;
pub mod matching;
pub mod pool;
pub mod rate_limit;
pub mod resolver;

// Re-export for convenience
pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use checker::Verifier;
pub use classifier::classify;
pub use matching::token_set_score;
pub use resolver::{Resolution, Resolver};

/// A bibliographic reference parsed out of a source document.
///
/// Every field except `authors` uses the empty string for "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Human-readable concatenation of the known fields, for diagnostics.
    pub raw: String,
    #[serde(default)]
    pub title: String,
    /// Free-form; not guaranteed to be numeric.
    #[serde(default)]
    pub year: String,
    /// Persistent identifier (DOI-shaped).
    #[serde(default, rename = "doi")]
    pub identifier: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl ReferenceRecord {
    /// Build a record from its parts, deriving `raw` from the non-empty
    /// title, year and identifier joined with `" | "`.
    pub fn new(
        title: impl Into<String>,
        year: impl Into<String>,
        identifier: impl Into<String>,
        authors: Vec<String>,
    ) -> Self {
        let title = title.into().trim().to_string();
        let year = year.into().trim().to_string();
        let identifier = identifier.into().trim().to_string();
        let raw = [title.as_str(), year.as_str(), identifier.as_str()]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" | ");
        Self {
            raw,
            title,
            year,
            identifier,
            authors,
        }
    }

    /// The identifier with surrounding whitespace removed, if any is left.
    pub fn identifier(&self) -> Option<&str> {
        let id = self.identifier.trim();
        (!id.is_empty()).then_some(id)
    }

    /// The title with surrounding whitespace removed, if any is left.
    pub fn title(&self) -> Option<&str> {
        let title = self.title.trim();
        (!title.is_empty()).then_some(title)
    }
}

/// Outcome classes for a single verified reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    #[serde(alias = "FOUND_BY_DOI")]
    FoundByIdentifier,
    #[serde(alias = "DOI_NOT_FOUND")]
    IdentifierNotFound,
    FoundByTitleHigh,
    FoundByTitleMed,
    NotFound,
    NoTitle,
}

impl VerdictStatus {
    pub const ALL: [VerdictStatus; 6] = [
        VerdictStatus::FoundByIdentifier,
        VerdictStatus::IdentifierNotFound,
        VerdictStatus::FoundByTitleHigh,
        VerdictStatus::FoundByTitleMed,
        VerdictStatus::NotFound,
        VerdictStatus::NoTitle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::FoundByIdentifier => "FOUND_BY_IDENTIFIER",
            VerdictStatus::IdentifierNotFound => "IDENTIFIER_NOT_FOUND",
            VerdictStatus::FoundByTitleHigh => "FOUND_BY_TITLE_HIGH",
            VerdictStatus::FoundByTitleMed => "FOUND_BY_TITLE_MED",
            VerdictStatus::NotFound => "NOT_FOUND",
            VerdictStatus::NoTitle => "NO_TITLE",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classification of one reference against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// Title similarity in `0..=100`.
    #[serde(deserialize_with = "score_from_number")]
    pub score: u8,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub match_title: String,
    #[serde(default, rename = "match_doi", deserialize_with = "null_as_empty")]
    pub match_identifier: String,
    #[serde(default)]
    pub reason: String,
}

/// Older result files store the score as a float percentage.
fn score_from_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(matching::floor_score(f64::deserialize(deserializer)?))
}

/// Older result files write `null` where the catalog had no value.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Score cut-offs for title-search matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum score for [`VerdictStatus::FoundByTitleHigh`].
    pub high: u8,
    /// Minimum score for [`VerdictStatus::FoundByTitleMed`].
    pub medium: u8,
}

pub const DEFAULT_HIGH_THRESHOLD: u8 = 90;
pub const DEFAULT_MEDIUM_THRESHOLD: u8 = 75;

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            medium: DEFAULT_MEDIUM_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(high: u8, medium: u8) -> Result<Self, ConfigError> {
        let thresholds = Self { high, medium };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.high > 100 || self.medium > self.high {
            return Err(ConfigError::InvalidThresholds {
                high: self.high,
                medium: self.medium,
            });
        }
        Ok(())
    }

    /// Map a title-search score to its verdict status.
    pub fn status_for(&self, score: u8) -> VerdictStatus {
        if score >= self.high {
            VerdictStatus::FoundByTitleHigh
        } else if score >= self.medium {
            VerdictStatus::FoundByTitleMed
        } else {
            VerdictStatus::NotFound
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid thresholds: need medium ({medium}) <= high ({high}) <= 100")]
    InvalidThresholds { high: u8, medium: u8 },
    #[error("search_rows must be at least 1")]
    ZeroRows,
    #[error("num_workers must be at least 1")]
    ZeroWorkers,
}

/// Progress events emitted while verifying a document's references.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checking {
        index: usize,
        total: usize,
        title: String,
    },
    Result {
        index: usize,
        total: usize,
        verdict: Box<Verdict>,
    },
    Failed {
        index: usize,
        total: usize,
        title: String,
        message: String,
    },
}

pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";
pub const DEFAULT_CROSSREF_URL: &str = "https://api.crossref.org";
pub const DEFAULT_SEARCH_ROWS: usize = 5;

/// Runtime configuration shared by the pipeline stages.
#[derive(Clone)]
pub struct Config {
    pub grobid_url: String,
    pub crossref_url: String,
    pub crossref_mailto: Option<String>,
    /// Result cap for title searches.
    pub search_rows: usize,
    pub thresholds: Thresholds,
    pub lookup_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub conversion_timeout_secs: u64,
    pub num_workers: usize,
    /// Catalog request pacing; 0 disables it.
    pub requests_per_second: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("grobid_url", &self.grobid_url)
            .field("crossref_url", &self.crossref_url)
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .field("search_rows", &self.search_rows)
            .field("thresholds", &self.thresholds)
            .field("lookup_timeout_secs", &self.lookup_timeout_secs)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("num_workers", &self.num_workers)
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grobid_url: DEFAULT_GROBID_URL.to_string(),
            crossref_url: DEFAULT_CROSSREF_URL.to_string(),
            crossref_mailto: None,
            search_rows: DEFAULT_SEARCH_ROWS,
            thresholds: Thresholds::default(),
            lookup_timeout_secs: 20,
            search_timeout_secs: 20,
            conversion_timeout_secs: 120,
            num_workers: 4,
            requests_per_second: 10,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.search_rows == 0 {
            return Err(ConfigError::ZeroRows);
        }
        if self.num_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    /// Apply the values present in a config file on top of `self`.
    pub fn apply_file(&mut self, file: &config_file::ConfigFile) {
        if let Some(ref grobid) = file.grobid {
            if let Some(ref url) = grobid.url {
                self.grobid_url = url.clone();
            }
            if let Some(secs) = grobid.timeout_secs {
                self.conversion_timeout_secs = secs;
            }
        }
        if let Some(ref crossref) = file.crossref {
            if let Some(ref url) = crossref.url {
                self.crossref_url = url.clone();
            }
            if crossref.mailto.is_some() {
                self.crossref_mailto = crossref.mailto.clone();
            }
            if let Some(rows) = crossref.search_rows {
                self.search_rows = rows;
            }
            if let Some(secs) = crossref.lookup_timeout_secs {
                self.lookup_timeout_secs = secs;
            }
            if let Some(secs) = crossref.search_timeout_secs {
                self.search_timeout_secs = secs;
            }
            if let Some(rps) = crossref.requests_per_second {
                self.requests_per_second = rps;
            }
        }
        if let Some(ref t) = file.thresholds {
            if let Some(high) = t.high {
                self.thresholds.high = high;
            }
            if let Some(medium) = t.medium {
                self.thresholds.medium = medium;
            }
        }
        if let Some(ref c) = file.concurrency
            && let Some(n) = c.num_workers
        {
            self.num_workers = n;
        }
    }
}

/// Verify a list of references against the Crossref catalog.
///
/// References are verified concurrently by `config.num_workers` tasks. The
/// returned vector is index-aligned with `refs`; slots for references that
/// were cancelled before they ran are `None`.
pub async fn verify_references(
    refs: Vec<ReferenceRecord>,
    verifier: std::sync::Arc<Verifier>,
    num_workers: usize,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Vec<Option<Result<Verdict, CatalogError>>> {
    checker::verify_references(refs, verifier, num_workers, progress, cancel).await
}
