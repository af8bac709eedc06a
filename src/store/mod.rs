//! Content store: durable persistence for job lifecycle rows and
//! normalized extracted records.
//!
//! All database access uses Diesel ORM with compile-time query checking.
//! The store is exposed as a trait so the orchestrator and HTTP layer take
//! an injected handle and tests can substitute fakes.

mod migrate;
mod models;
mod pool;
mod sqlite;

pub use migrate::run_migrations;
pub use pool::AsyncSqlitePool;
pub use sqlite::DieselStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ExtractedRecord, Job, JobStatus, JobUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Filter for record reads.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    /// Restrict to one source tag.
    pub source: Option<String>,
    /// Free-text match over title and body content.
    pub search: Option<String>,
    /// Maximum rows, most recent first.
    pub limit: i64,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            source: None,
            search: None,
            limit: 50,
        }
    }
}

/// Durable persistence contract consumed by the orchestrator and the
/// HTTP surface.
///
/// Writes are single-row appends or updates keyed by row id / job id, so
/// concurrent jobs never conflict. Reads are snapshots of whatever has been
/// durably written at call time.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a job row. Idempotent: if a row with the same `job_id`
    /// already exists, its id is returned and nothing is written.
    async fn create_job(&self, job: &Job) -> Result<i64, StoreError>;

    /// Apply a partial update to a job row. Only fields present in the
    /// update are touched.
    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// List jobs, optionally filtered by status, most recent first.
    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError>;

    /// Aggregate job counts keyed by status string.
    async fn job_counts(&self) -> Result<BTreeMap<String, i64>, StoreError>;

    /// Append one normalized record. Records are immutable after creation.
    async fn save_record(&self, record: &ExtractedRecord) -> Result<i64, StoreError>;

    async fn list_records(&self, query: RecordQuery) -> Result<Vec<ExtractedRecord>, StoreError>;

    /// Aggregate record counts keyed by source tag.
    async fn record_counts(&self) -> Result<BTreeMap<String, i64>, StoreError>;
}

/// Parse a datetime string from the database, defaulting to Unix epoch on
/// error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}
