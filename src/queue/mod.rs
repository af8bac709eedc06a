//! Job queue abstraction consumed by the worker pool.
//!
//! The durable broker is an external collaborator; this module defines the
//! narrow interface the orchestrator pulls from plus an in-process
//! implementation used by the single-binary deployment. Redelivery and
//! visibility timeouts belong to the broker, not to this interface.

mod memory;
mod producer;

pub use memory::MemoryJobQueue;
pub use producer::JobProducer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{JobParameters, JobType};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
}

/// The broker payload: everything a worker needs to route and run a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: String,
    pub job_type: JobType,
    pub parameters: JobParameters,
}

/// Queue interface the orchestrator consumes from.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job. Fails once the queue has been closed.
    async fn push(&self, job: QueuedJob) -> Result<(), QueueError>;

    /// Await the next job, biased by priority. Returns `None` once the
    /// queue is closed and drained, which shuts the worker down.
    async fn pull(&self) -> Option<QueuedJob>;

    /// Close the queue: pending jobs still drain, new pushes fail.
    async fn close(&self);

    /// Jobs currently waiting.
    async fn depth(&self) -> usize;
}
