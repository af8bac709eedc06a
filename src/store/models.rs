//! Diesel row models and conversions to domain types.

use diesel::prelude::*;

use crate::models::{
    ExtractedRecord, Job, JobParameters, JobStatus, JobType, ResultSummary,
};
use crate::schema;

use super::{parse_datetime, parse_datetime_opt};

/// Job row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRow {
    pub id: i32,
    pub job_id: String,
    pub job_type: String,
    pub target_url: Option<String>,
    pub max_items: i32,
    pub max_pages: i32,
    pub priority: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub result_summary: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// New job for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::jobs)]
pub struct NewJob<'a> {
    pub job_id: &'a str,
    pub job_type: &'a str,
    pub target_url: Option<&'a str>,
    pub max_items: i32,
    pub max_pages: i32,
    pub priority: i32,
    pub status: &'a str,
    pub started_at: String,
}

/// Extracted record row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::extracted_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordRow {
    pub id: i32,
    pub source: String,
    pub source_url: String,
    pub title: Option<String>,
    pub body_content: String,
    pub raw_payload: String,
    pub metadata: String,
    pub scraped_at: String,
}

/// New record for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::extracted_records)]
pub struct NewRecord<'a> {
    pub source: &'a str,
    pub source_url: &'a str,
    pub title: Option<&'a str>,
    pub body_content: &'a str,
    pub raw_payload: &'a str,
    pub metadata: String,
    pub scraped_at: String,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        let result_summary: Option<ResultSummary> = row
            .result_summary
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok());

        Job {
            id: row.id as i64,
            job_id: row.job_id,
            // The producer rejects unknown types before insertion, so a
            // miss here can only come from a hand-edited row.
            job_type: JobType::from_str(&row.job_type).unwrap_or(JobType::Quotes),
            parameters: JobParameters {
                url: row.target_url,
                max_items: row.max_items.max(0) as usize,
                max_pages: row.max_pages.max(0) as usize,
                priority: row.priority,
            },
            status: JobStatus::from_str(&row.status).unwrap_or(JobStatus::Pending),
            started_at: parse_datetime(&row.started_at),
            completed_at: parse_datetime_opt(row.completed_at),
            error_message: row.error_message,
            result_summary,
        }
    }
}

impl From<RecordRow> for ExtractedRecord {
    fn from(row: RecordRow) -> Self {
        ExtractedRecord {
            id: row.id as i64,
            source: row.source,
            source_url: row.source_url,
            title: row.title,
            body_content: row.body_content,
            raw_payload: row.raw_payload,
            metadata: serde_json::from_str(&row.metadata).unwrap_or_default(),
            scraped_at: parse_datetime(&row.scraped_at),
        }
    }
}
