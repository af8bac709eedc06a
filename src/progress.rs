//! Progress reporting for in-flight jobs.
//!
//! A narrow sink the orchestrator (and strategies, for mid-extraction
//! milestones) call synchronously. Keeps progress observable without an
//! event-emitter fan-out.

use crate::models::{JobStatus, ResultSummary};

/// Receives coarse progress milestones for one job.
pub trait ProgressSink: Send + Sync {
    /// Called at defined milestones with an approximate completion percent.
    fn report(&self, percent: u8);

    /// Called exactly once when the job reaches a terminal status.
    fn on_terminal(&self, status: JobStatus, summary: Option<&ResultSummary>);
}

/// Logs milestones through tracing.
pub struct LogProgress {
    job_id: String,
}

impl LogProgress {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, percent: u8) {
        tracing::debug!(job_id = %self.job_id, percent, "job progress");
    }

    fn on_terminal(&self, status: JobStatus, summary: Option<&ResultSummary>) {
        match summary {
            Some(summary) => tracing::info!(
                job_id = %self.job_id,
                status = status.as_str(),
                count = summary.count,
                "job finished"
            ),
            None => tracing::info!(
                job_id = %self.job_id,
                status = status.as_str(),
                "job finished"
            ),
        }
    }
}
