//! Job lifecycle models.
//!
//! A job is one queued extraction request. Its status moves strictly
//! `pending -> active -> {completed, failed}` and never re-enters `pending`
//! after leaving it; `completed_at` is set exactly when a terminal state is
//! reached.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, JobStatus::Active)
                | (Self::Active, JobStatus::Completed)
                | (Self::Active, JobStatus::Failed)
        )
    }
}

/// Registered extraction source a job routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Paginated quote listings.
    Quotes,
    /// Discussion board posts.
    Discussion,
    /// Multi-category discovery items (videos, profiles, categories).
    Discovery,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Discussion => "discussion",
            Self::Discovery => "discovery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quotes" => Some(Self::Quotes),
            "discussion" => Some(Self::Discussion),
            "discovery" => Some(Self::Discovery),
            _ => None,
        }
    }
}

/// Caller-supplied parameters for an extraction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParameters {
    /// Target URL override. Strategies fall back to their built-in
    /// candidate ladder when absent.
    #[serde(default)]
    pub url: Option<String>,

    /// Upper bound on extracted units per page.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Upper bound on pages for paginated sources.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Dequeue bias. Higher values are pulled first; equal priorities are
    /// FIFO. Not a strict ordering guarantee under concurrent submission.
    #[serde(default)]
    pub priority: i32,
}

fn default_max_items() -> usize {
    25
}

fn default_max_pages() -> usize {
    1
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            url: None,
            max_items: default_max_items(),
            max_pages: default_max_pages(),
            priority: 0,
        }
    }
}

/// Summary of a completed job's output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Records actually persisted. Store failures for individual records
    /// are excluded, so this never exceeds what is durably written.
    pub count: usize,
    /// Persisted record counts keyed by sub-type (post type, item kind...).
    #[serde(default)]
    pub by_type: BTreeMap<String, usize>,
    /// A representative item, e.g. the top-scored post title.
    #[serde(default)]
    pub top: Option<String>,
}

/// One queued extraction request with lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Database row ID (0 until persisted).
    pub id: i64,
    /// Caller-opaque unique identifier.
    pub job_id: String,
    pub job_type: JobType,
    pub parameters: JobParameters,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    /// Set exactly when status is completed or failed.
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_summary: Option<ResultSummary>,
}

impl Job {
    /// Create a new pending job with a fresh identifier.
    pub fn new(job_type: JobType, parameters: JobParameters) -> Self {
        Self {
            id: 0,
            job_id: uuid::Uuid::new_v4().to_string(),
            job_type,
            parameters,
            status: JobStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            result_summary: None,
        }
    }
}

/// Partial update applied to a job row. Only provided fields change.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_summary: Option<ResultSummary>,
}

impl JobUpdate {
    /// Transition to `active`.
    pub fn active() -> Self {
        Self {
            status: Some(JobStatus::Active),
            ..Default::default()
        }
    }

    /// Terminal success with a result summary.
    pub fn completed(summary: ResultSummary) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            completed_at: Some(Utc::now()),
            result_summary: Some(summary),
            ..Default::default()
        }
    }

    /// Terminal failure with a human-readable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            completed_at: Some(Utc::now()),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}
