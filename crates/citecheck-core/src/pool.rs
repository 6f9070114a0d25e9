//! Worker pool for reference verification.
//!
//! Jobs go through one unbounded `async_channel` queue drained by
//! `num_workers` tasks. Each job carries its own oneshot sender, so results
//! stay tagged with their reference index no matter which worker finishes
//! first. Workers share nothing but the read-only [`Verifier`].

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::checker::Verifier;
use crate::{CatalogError, ProgressEvent, ReferenceRecord, Verdict};

/// A reference verification job submitted to the pool.
pub struct VerifyJob {
    pub reference: ReferenceRecord,
    pub result_tx: oneshot::Sender<Result<Verdict, CatalogError>>,
    pub ref_index: usize,
    pub total: usize,
    /// Progress callback for this job (emits Checking, Result, Failed).
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

/// A pool of worker tasks that verify references.
///
/// Submit jobs via [`submit()`](VerifyPool::submit), receive results via
/// the oneshot receiver paired with each job. A job whose sender is dropped
/// without a result was cancelled.
pub struct VerifyPool {
    job_tx: async_channel::Sender<VerifyJob>,
    pool_handle: JoinHandle<()>,
}

impl VerifyPool {
    /// Create a new pool with `num_workers` worker tasks.
    pub fn new(verifier: Arc<Verifier>, cancel: CancellationToken, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<VerifyJob>();

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    verifier.clone(),
                    cancel.clone(),
                )));
            }

            // Drop our clone so workers are the last holders
            drop(job_rx);

            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    /// Submit a job to the pool.
    pub async fn submit(&self, job: VerifyJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the queue and wait for all workers to finish.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

async fn worker_loop(
    rx: async_channel::Receiver<VerifyJob>,
    verifier: Arc<Verifier>,
    cancel: CancellationToken,
) {
    while let Ok(job) = rx.recv().await {
        if cancel.is_cancelled() {
            // Dropping the sender tells the submitter the job never ran.
            continue;
        }

        let title = display_title(&job.reference);
        (job.progress)(ProgressEvent::Checking {
            index: job.ref_index,
            total: job.total,
            title: title.clone(),
        });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = verifier.verify(&job.reference) => Some(result),
        };
        let Some(result) = outcome else {
            continue;
        };

        match result {
            Ok(ref verdict) => (job.progress)(ProgressEvent::Result {
                index: job.ref_index,
                total: job.total,
                verdict: Box::new(verdict.clone()),
            }),
            Err(ref e) => {
                tracing::warn!(index = job.ref_index, error = %e, "reference resolution failed");
                (job.progress)(ProgressEvent::Failed {
                    index: job.ref_index,
                    total: job.total,
                    title,
                    message: e.to_string(),
                });
            }
        }

        let _ = job.result_tx.send(result);
    }
}

fn display_title(reference: &ReferenceRecord) -> String {
    reference
        .title()
        .map(String::from)
        .unwrap_or_else(|| reference.raw.clone())
}
