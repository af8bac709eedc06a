//! Failure taxonomy for the extraction pipeline.
//!
//! Two recovery layers exist: per-unit parse failures are swallowed inside
//! a batch, and a wholesale primary-extraction failure falls back to the
//! degraded extractor. Everything else surfaces as a job-level failure.

use thiserror::Error;

/// Errors raised while navigating and extracting from a live page.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Every candidate URL failed the success predicate or timed out.
    /// Carries the last underlying failure for the job's error message.
    #[error("all {attempts} candidate URLs exhausted: {last_error}")]
    NavigationExhausted { attempts: usize, last_error: String },

    /// Primary extraction failed wholesale (not a single-unit miss).
    /// The orchestrator recovers by running the fallback extractor.
    #[error("batch extraction failed: {0}")]
    Batch(String),

    /// A single unit could not be parsed. Recovered locally: the unit is
    /// skipped and the batch continues.
    #[error("unit parse failed: {0}")]
    UnitParse(String),

    #[error("page fetch failed: {0}")]
    Fetch(#[from] crate::browser::FetchError),
}

/// Job-level failures recorded on the job row before they propagate.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job's type does not match any registered strategy. Raised
    /// synchronously, before any browser session is opened.
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("queue error: {0}")]
    Queue(String),

    /// Every record write for the job failed. Partial write failures are
    /// absorbed per record; losing the whole batch is a job failure.
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("browser session error: {0}")]
    Session(String),
}
