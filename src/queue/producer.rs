//! External-facing enqueue operation.
//!
//! Validates the job type against the strategy registry before anything
//! else happens: an unregistered type is rejected synchronously, with no
//! job row written and no browser session opened.

use std::sync::Arc;

use tracing::info;

use crate::error::JobError;
use crate::extract::StrategyRegistry;
use crate::models::{Job, JobParameters, JobType};
use crate::store::ContentStore;

use super::{JobQueue, QueuedJob};

/// Accepts extraction requests and hands them to the broker.
pub struct JobProducer {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ContentStore>,
    registry: Arc<StrategyRegistry>,
}

impl JobProducer {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ContentStore>,
        registry: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            queue,
            store,
            registry,
        }
    }

    /// Enqueue a job of the named type. Returns the caller-opaque job id
    /// usable for status lookup.
    pub async fn submit(
        &self,
        job_type: &str,
        parameters: JobParameters,
    ) -> Result<String, JobError> {
        let job_type = JobType::from_str(job_type)
            .filter(|ty| self.registry.contains(*ty))
            .ok_or_else(|| JobError::UnknownJobType(job_type.to_string()))?;

        let job = Job::new(job_type, parameters);
        self.store.create_job(&job).await?;

        self.queue
            .push(QueuedJob {
                job_id: job.job_id.clone(),
                job_type,
                parameters: job.parameters.clone(),
            })
            .await
            .map_err(|e| JobError::Queue(e.to_string()))?;

        info!(job_id = %job.job_id, job_type = job_type.as_str(), "job enqueued");
        Ok(job.job_id)
    }
}
