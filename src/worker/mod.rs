//! Job orchestrator: a fixed-size worker pool over the shared queue.
//!
//! Each worker pulls jobs, routes them to a registered strategy, runs the
//! extraction against a dedicated browser session, and persists lifecycle
//! plus results. A failing job only ever affects its own outcome; the pool
//! keeps running.

mod export;

pub use export::export_records;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::browser::SessionFactory;
use crate::error::JobError;
use crate::extract::StrategyRegistry;
use crate::models::{ExtractedRecord, JobStatus, JobUpdate, ResultSummary};
use crate::progress::{LogProgress, ProgressSink};
use crate::queue::{JobQueue, QueuedJob};
use crate::store::ContentStore;

/// Concurrency-limited pool executing extraction jobs.
///
/// All collaborators are injected; the only state shared between
/// concurrently running jobs is the content store and the queue.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ContentStore>,
    registry: Arc<StrategyRegistry>,
    sessions: Arc<dyn SessionFactory>,
    /// Flat-text mirror directory for the quotes source. Side output only.
    export_dir: Option<PathBuf>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ContentStore>,
        registry: Arc<StrategyRegistry>,
        sessions: Arc<dyn SessionFactory>,
        export_dir: Option<PathBuf>,
        worker_count: usize,
    ) -> Self {
        Self {
            queue,
            store,
            registry,
            sessions,
            export_dir,
            worker_count: worker_count.max(1),
        }
    }

    /// Run workers until the queue closes and drains.
    pub async fn run(self: Arc<Self>) {
        info!("Starting {} extraction workers", self.worker_count);

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let pool = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        info!("Worker pool drained");
    }

    async fn worker_loop(&self, worker_id: usize) {
        while let Some(job) = self.queue.pull().await {
            info!(worker_id, job_id = %job.job_id, job_type = job.job_type.as_str(), "job dequeued");
            let progress = LogProgress::new(&job.job_id);

            // Job failures are terminal for the job, never for the worker.
            if let Err(e) = self.process_job(&job, &progress).await {
                warn!(worker_id, job_id = %job.job_id, "job failed: {}", e);
            }
        }
        debug!(worker_id, "queue closed, worker exiting");
    }

    /// Drive one job through its lifecycle. The job row reaches a terminal
    /// status on every path before an error is allowed to propagate.
    pub async fn process_job(
        &self,
        job: &QueuedJob,
        progress: &dyn ProgressSink,
    ) -> Result<ResultSummary, JobError> {
        self.store
            .update_job(&job.job_id, JobUpdate::active())
            .await?;

        match self.run_extraction(job, progress).await {
            Ok(summary) => {
                self.store
                    .update_job(&job.job_id, JobUpdate::completed(summary.clone()))
                    .await?;
                progress.report(100);
                progress.on_terminal(JobStatus::Completed, Some(&summary));
                Ok(summary)
            }
            Err(err) => {
                // Record the failure before surfacing it to the queue
                // runtime, which governs outer redelivery.
                if let Err(store_err) = self
                    .store
                    .update_job(&job.job_id, JobUpdate::failed(err.to_string()))
                    .await
                {
                    warn!(job_id = %job.job_id, "could not record job failure: {}", store_err);
                }
                progress.report(100);
                progress.on_terminal(JobStatus::Failed, None);
                Err(err)
            }
        }
    }

    async fn run_extraction(
        &self,
        job: &QueuedJob,
        progress: &dyn ProgressSink,
    ) -> Result<ResultSummary, JobError> {
        // Route before opening anything: an unregistered type never costs
        // a browser session.
        let strategy = self
            .registry
            .get(job.job_type)
            .ok_or_else(|| JobError::UnknownJobType(job.job_type.as_str().to_string()))?;

        let session = self
            .sessions
            .open()
            .await
            .map_err(|e| JobError::Session(e.to_string()))?;
        progress.report(10);

        // The session is closed on every exit path, including strategy
        // failure, before the outcome is inspected.
        let outcome = strategy
            .execute(session.as_ref(), &job.parameters, progress)
            .await;
        session.close().await;
        let extraction = outcome?;

        let unit_count = extraction.units.len();
        if extraction.degraded {
            warn!(job_id = %job.job_id, "extraction degraded to fallback parser");
        }

        let mut summary = ResultSummary::default();
        let mut stored_records: Vec<ExtractedRecord> = Vec::new();
        let mut top: Option<(i64, String)> = None;
        let mut writes_attempted = 0usize;

        for unit in &extraction.units {
            let record = match unit.normalize(&extraction.context_url) {
                Ok(record) => record,
                Err(e) => {
                    warn!(job_id = %job.job_id, "skipping invalid unit: {}", e);
                    continue;
                }
            };
            writes_attempted += 1;

            // A failed write is logged and skipped; the summary only ever
            // counts records that were actually written.
            match self.store.save_record(&record).await {
                Ok(_) => {
                    *summary
                        .by_type
                        .entry(unit.sub_type().to_string())
                        .or_insert(0) += 1;
                    let score = unit.score();
                    if top.as_ref().map(|(best, _)| score > *best).unwrap_or(true) {
                        top = Some((score, unit.label()));
                    }
                    stored_records.push(record);
                }
                Err(e) => {
                    warn!(job_id = %job.job_id, "record persist failed, skipping: {}", e);
                }
            }
        }

        summary.count = stored_records.len();
        summary.top = top.map(|(_, label)| label);

        if writes_attempted > 0 && summary.count == 0 {
            return Err(JobError::Persistence(format!(
                "all {writes_attempted} record writes failed"
            )));
        }

        progress.report(95);

        if strategy.source() == "quotes" {
            if let Some(dir) = &self.export_dir {
                // Best-effort mirror; never affects the job outcome.
                if let Err(e) = export_records(dir, &job.job_id, &stored_records) {
                    warn!(job_id = %job.job_id, "flat-text export failed: {}", e);
                }
            }
        }

        debug!(
            job_id = %job.job_id,
            units = unit_count,
            stored = summary.count,
            "extraction persisted"
        );

        Ok(summary)
    }
}
