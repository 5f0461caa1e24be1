//! SurrealDB-backed job storage.

use chrono::{DateTime, Utc};
use relay_core::{Job, JobId, JobStatus};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::storage::{JobStorage, StorageFuture};
use crate::{Database, DbError};

const TABLE: &str = "job";

/// Repository persisting jobs in the `job` table, keyed by job ID.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    job_id: String,
    name: String,
    #[serde(default)]
    arguments: Vec<String>,
    status: JobStatus,
    created_at: DateTime<Utc>,
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        Self {
            id: None,
            job_id: job.id.to_string(),
            name: job.name.clone(),
            arguments: job.arguments.clone(),
            status: job.status,
            created_at: job.created_at,
        }
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = DbError;

    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        let id = JobId::parse(&record.job_id)
            .map_err(|e| DbError::Serialization(format!("bad job id {}: {}", record.job_id, e)))?;
        Ok(Job {
            id,
            name: record.name,
            arguments: record.arguments,
            status: record.status,
            created_at: record.created_at,
        })
    }
}

impl JobRepository {
    /// Wrap an open connection. The schema must already be initialized.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn upsert(&self, job: &Job) -> Result<(), DbError> {
        let record: Option<JobRecord> = self
            .db
            .upsert((TABLE, job.id.to_string()))
            .content(JobRecord::from(job))
            .await?;

        record
            .map(|_| ())
            .ok_or_else(|| DbError::Query(format!("Failed to save job {}", job.id)))
    }

    async fn select(&self, id: JobId) -> Result<Option<Job>, DbError> {
        let record: Option<JobRecord> = self.db.select((TABLE, id.to_string())).await?;
        record.map(Job::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Job>, DbError> {
        let mut response = self
            .db
            .query("SELECT * FROM job ORDER BY job_id ASC")
            .await?;
        let records: Vec<JobRecord> = response.take(0)?;

        records.into_iter().map(Job::try_from).collect()
    }
}

impl JobStorage for JobRepository {
    fn save<'a>(&'a self, job: &'a Job) -> StorageFuture<'a, ()> {
        Box::pin(self.upsert(job))
    }

    fn get(&self, id: JobId) -> StorageFuture<'_, Option<Job>> {
        Box::pin(self.select(id))
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Job>> {
        Box::pin(self.list())
    }
}
