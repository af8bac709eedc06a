//! JSON request handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::JobError;
use crate::models::{JobParameters, JobStatus};
use crate::store::RecordQuery;

use super::AppState;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub job_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub priority: Option<i32>,
}

impl SubmitRequest {
    fn parameters(&self) -> JobParameters {
        let defaults = JobParameters::default();
        JobParameters {
            url: self.url.clone(),
            max_items: self.max_items.unwrap_or(defaults.max_items),
            max_pages: self.max_pages.unwrap_or(defaults.max_pages),
            priority: self.priority.unwrap_or(defaults.priority),
        }
    }
}

/// POST /api/jobs
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Response {
    match state
        .producer
        .submit(&request.job_type, request.parameters())
        .await
    {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(json!({ "job_id": job_id }))).into_response(),
        Err(JobError::UnknownJobType(ty)) => {
            error_response(StatusCode::BAD_REQUEST, format!("unknown job type: {ty}"))
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/jobs/:job_id
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match state.store.get_job(&job_id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("no such job: {job_id}")),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/jobs?status=&limit=
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Response {
    let status = match query.status.as_deref() {
        Some(raw) => match JobStatus::from_str(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid status filter: {raw}"),
                )
            }
        },
        None => None,
    };

    match state.store.list_jobs(status, query.limit).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListRecordsQuery {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/records?source=&search=&limit=
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<ListRecordsQuery>,
) -> Response {
    let record_query = RecordQuery {
        source: query.source,
        search: query.search,
        limit: query.limit,
    };

    match state.store.list_records(record_query).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Response {
    let jobs = match state.store.job_counts().await {
        Ok(counts) => counts,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let records = match state.store.record_counts().await {
        Ok(counts) => counts,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    Json(json!({ "jobs": jobs, "records": records })).into_response()
}
