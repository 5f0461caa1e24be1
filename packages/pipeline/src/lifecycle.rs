//! Job lifecycle service: creation, lookup and status transitions.

use std::sync::Arc;

use db::{DbError, JobStorage};
use relay_core::{Envelope, Job, JobEvent, JobId, JobRecord, JobSpec, JobStatus};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::queue::Outbox;

#[derive(Debug, Error)]
pub enum JobServiceError {
    #[error("Can't save job {id}")]
    Save {
        id: JobId,
        #[source]
        source: DbError,
    },

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

/// Owns every write to the job store and announces new jobs.
pub struct JobService {
    storage: Arc<dyn JobStorage>,
    outbox: Outbox,
    /// Held across the read and write of a status change.
    updates: Mutex<()>,
}

impl JobService {
    pub fn new(storage: Arc<dyn JobStorage>, outbox: Outbox) -> Self {
        Self {
            storage,
            outbox,
            updates: Mutex::new(()),
        }
    }

    /// Store a new queued job and publish `jobRegistered` for it.
    ///
    /// Nothing is published when the save fails.
    pub async fn create(
        &self,
        spec: JobSpec,
        correlation_id: Option<String>,
    ) -> Result<JobRecord, JobServiceError> {
        let job = Job::new(spec);

        if let Err(source) = self.storage.save(&job).await {
            tracing::error!(job_id = %job.id, "Can't save job {}: {}", job.name, source);
            return Err(JobServiceError::Save { id: job.id, source });
        }

        tracing::info!(job_id = %job.id, correlation_id = ?correlation_id, "Registered job {}", job.name);
        self.outbox.add(Envelope::new(
            JobEvent::JobRegistered {
                id: job.id,
                status: job.status,
            },
            correlation_id,
        ));

        Ok(job.to_record())
    }

    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>, JobServiceError> {
        let job = self.storage.get(id).await?;
        Ok(job.as_ref().map(Job::to_record))
    }

    /// All jobs in creation order.
    pub async fn get_all(&self) -> Result<Vec<JobRecord>, JobServiceError> {
        let jobs = self.storage.get_all().await?;
        Ok(jobs.iter().map(Job::to_record).collect())
    }

    /// Overwrite the status of an existing job.
    ///
    /// Transitions are not restricted. Leaving a terminal status is logged.
    /// Concurrent changes are applied one at a time, so none works from a
    /// stale read.
    pub async fn change_status(&self, id: JobId, status: JobStatus) -> Result<(), JobServiceError> {
        let _update = self.updates.lock().await;
        let mut job = self
            .storage
            .get(id)
            .await?
            .ok_or(JobServiceError::NotFound(id))?;

        if job.status.is_terminal() && job.status != status {
            tracing::warn!(job_id = %id, "Job leaves terminal status {} for {}", job.status, status);
        }

        job.status = status;
        self.storage
            .save(&job)
            .await
            .map_err(|source| JobServiceError::Save { id, source })?;

        tracing::debug!(job_id = %id, "Job status changed to {}", status);
        Ok(())
    }
}
