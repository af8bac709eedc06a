//! Diesel-backed SQLite implementation of the content store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::models::{ExtractedRecord, Job, JobStatus, JobUpdate};
use crate::schema::{extracted_records, jobs};

use super::models::{JobRow, NewJob, NewRecord, RecordRow};
use super::pool::AsyncSqlitePool;
use super::{ContentStore, RecordQuery, StoreError};

/// Content store over a SQLite database file.
#[derive(Clone)]
pub struct DieselStore {
    pool: AsyncSqlitePool,
}

impl DieselStore {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }
}

/// Partial changeset for job rows. `None` fields are left untouched.
#[derive(AsChangeset, Default)]
#[diesel(table_name = jobs)]
struct JobChanges {
    status: Option<String>,
    error_message: Option<String>,
    result_summary: Option<String>,
    completed_at: Option<String>,
}

impl JobChanges {
    fn from_update(update: JobUpdate) -> Result<Self, StoreError> {
        let result_summary = update
            .result_summary
            .map(|s| serde_json::to_string(&s))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            status: update.status.map(|s| s.as_str().to_string()),
            error_message: update.error_message,
            result_summary,
            completed_at: update.completed_at.map(|dt| dt.to_rfc3339()),
        })
    }
}

#[derive(diesel::QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt, column_name = "last_insert_rowid()")]
    id: i64,
}

#[async_trait]
impl ContentStore for DieselStore {
    async fn create_job(&self, job: &Job) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;

        // Idempotent creation: an existing row with this job_id wins.
        let existing: Option<i32> = jobs::table
            .filter(jobs::job_id.eq(&job.job_id))
            .select(jobs::id)
            .first(&mut conn)
            .await
            .optional()?;

        if let Some(id) = existing {
            debug!(job_id = %job.job_id, "job already exists, returning existing row");
            return Ok(id as i64);
        }

        let new_job = NewJob {
            job_id: &job.job_id,
            job_type: job.job_type.as_str(),
            target_url: job.parameters.url.as_deref(),
            max_items: job.parameters.max_items as i32,
            max_pages: job.parameters.max_pages as i32,
            priority: job.parameters.priority,
            status: job.status.as_str(),
            started_at: job.started_at.to_rfc3339(),
        };

        diesel::insert_into(jobs::table)
            .values(&new_job)
            .execute(&mut conn)
            .await?;

        let row = diesel::sql_query("SELECT last_insert_rowid()")
            .get_result::<LastInsertRowId>(&mut conn)
            .await?;
        Ok(row.id)
    }

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let changes = JobChanges::from_update(update)?;
        let mut conn = self.pool.get().await?;

        diesel::update(jobs::table.filter(jobs::job_id.eq(job_id)))
            .set(&changes)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;

        let row: Option<JobRow> = jobs::table
            .filter(jobs::job_id.eq(job_id))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Job::from))
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<JobRow> = match status {
            Some(status) => {
                jobs::table
                    .filter(jobs::status.eq(status.as_str()))
                    .order(jobs::started_at.desc())
                    .limit(limit)
                    .load(&mut conn)
                    .await?
            }
            None => {
                jobs::table
                    .order(jobs::started_at.desc())
                    .limit(limit)
                    .load(&mut conn)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn job_counts(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        let rows: Vec<(String, i64)> = jobs::table
            .group_by(jobs::status)
            .select((jobs::status, count_star()))
            .load(&mut conn)
            .await?;

        Ok(rows.into_iter().collect())
    }

    async fn save_record(&self, record: &ExtractedRecord) -> Result<i64, StoreError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut conn = self.pool.get().await?;

        let new_record = NewRecord {
            source: &record.source,
            source_url: &record.source_url,
            title: record.title.as_deref(),
            body_content: &record.body_content,
            raw_payload: &record.raw_payload,
            metadata,
            scraped_at: record.scraped_at.to_rfc3339(),
        };

        diesel::insert_into(extracted_records::table)
            .values(&new_record)
            .execute(&mut conn)
            .await?;

        let row = diesel::sql_query("SELECT last_insert_rowid()")
            .get_result::<LastInsertRowId>(&mut conn)
            .await?;
        Ok(row.id)
    }

    async fn list_records(&self, query: RecordQuery) -> Result<Vec<ExtractedRecord>, StoreError> {
        let mut conn = self.pool.get().await?;

        let mut sql = extracted_records::table.into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(source) = &query.source {
            sql = sql.filter(extracted_records::source.eq(source.clone()));
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search);
            sql = sql.filter(
                extracted_records::body_content
                    .like(pattern.clone())
                    .or(extracted_records::title.like(pattern)),
            );
        }

        let rows: Vec<RecordRow> = sql
            .order(extracted_records::scraped_at.desc())
            .limit(query.limit)
            .load(&mut conn)
            .await?;

        Ok(rows.into_iter().map(ExtractedRecord::from).collect())
    }

    async fn record_counts(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        let rows: Vec<(String, i64)> = extracted_records::table
            .group_by(extracted_records::source)
            .select((extracted_records::source, count_star()))
            .load(&mut conn)
            .await?;

        Ok(rows.into_iter().collect())
    }
}
