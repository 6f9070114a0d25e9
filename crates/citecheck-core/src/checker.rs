use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogError, CrossRef};
use crate::classifier::classify;
use crate::pool::{VerifyJob, VerifyPool};
use crate::rate_limit::CatalogLimiter;
use crate::resolver::Resolver;
use crate::{Config, ConfigError, ProgressEvent, ReferenceRecord, Thresholds, Verdict};

/// Resolver plus classification policy: turns one reference into one verdict.
pub struct Verifier {
    resolver: Resolver,
    thresholds: Thresholds,
}

impl Verifier {
    pub fn new(resolver: Resolver, thresholds: Thresholds) -> Self {
        Self {
            resolver,
            thresholds,
        }
    }

    /// Build a Crossref-backed verifier from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let catalog: Arc<dyn Catalog> = Arc::new(CrossRef::from_config(config, client));
        Ok(Self::with_catalog(catalog, config))
    }

    /// Build a verifier over any catalog, taking rows, thresholds and
    /// pacing from `config`.
    pub fn with_catalog(catalog: Arc<dyn Catalog>, config: &Config) -> Self {
        let limiter = CatalogLimiter::per_second(config.requests_per_second).map(Arc::new);
        let resolver = Resolver::new(catalog)
            .with_rows(config.search_rows)
            .with_limiter(limiter);
        Self::new(resolver, config.thresholds)
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve and classify one reference.
    pub async fn verify(&self, reference: &ReferenceRecord) -> Result<Verdict, CatalogError> {
        let resolution = self.resolver.resolve(reference).await?;
        let verdict = classify(reference, &resolution, &self.thresholds);
        tracing::debug!(
            status = %verdict.status,
            score = verdict.score,
            title = %reference.title,
            "reference classified"
        );
        Ok(verdict)
    }
}

/// Verify a list of references through a [`VerifyPool`].
///
/// The returned vector is index-aligned with `refs`. A `None` slot means the
/// reference was cancelled before it produced a result.
pub async fn verify_references(
    refs: Vec<ReferenceRecord>,
    verifier: Arc<Verifier>,
    num_workers: usize,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Vec<Option<Result<Verdict, CatalogError>>> {
    let total = refs.len();
    if total == 0 {
        return vec![];
    }

    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);
    let pool = VerifyPool::new(verifier, cancel.clone(), num_workers);

    let mut receivers = Vec::with_capacity(total);
    for (i, reference) in refs.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        let job = VerifyJob {
            reference,
            result_tx,
            ref_index: i,
            total,
            progress: progress.clone(),
        };

        pool.submit(job).await;
        receivers.push((i, result_rx));
    }

    let mut results: Vec<Option<Result<Verdict, CatalogError>>> =
        std::iter::repeat_with(|| None).take(total).collect();
    for (i, rx) in receivers {
        if let Ok(result) = rx.await {
            results[i] = Some(result);
        }
    }

    pool.shutdown().await;

    results
}
