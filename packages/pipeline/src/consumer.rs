//! Status consumer: folds outcome events back into the job store.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{Envelope, JobEvent, JobId, JobStatus, PipelineConfig, Topic};
use thiserror::Error;

use crate::gate::ConcurrencyGate;
use crate::lifecycle::{JobService, JobServiceError};
use crate::queue::{EventQueue, consume_gated};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Unsupported event type: {0}")]
    UnsupportedEvent(Topic),

    #[error(transparent)]
    Jobs(#[from] JobServiceError),
}

/// Status a job takes after an outcome event.
pub fn status_for(event: &JobEvent) -> Result<(JobId, JobStatus), ConsumerError> {
    match event {
        JobEvent::JobCompleted { id, .. } => Ok((*id, JobStatus::Completed)),
        JobEvent::JobFailed { id, .. } => Ok((*id, JobStatus::Failed)),
        JobEvent::JobCrashed { id, .. } => Ok((*id, JobStatus::Crashed)),
        JobEvent::JobRetried { id, .. } => Ok((*id, JobStatus::Retried)),
        other => Err(ConsumerError::UnsupportedEvent(other.topic())),
    }
}

pub struct StatusConsumer {
    inbox: EventQueue,
    jobs: Arc<JobService>,
    gate: ConcurrencyGate,
    poll_delay: Duration,
}

impl StatusConsumer {
    /// Topics this consumer subscribes to.
    pub const TOPICS: [Topic; 4] = [
        Topic::JobCompleted,
        Topic::JobFailed,
        Topic::JobRetried,
        Topic::JobCrashed,
    ];

    pub fn new(inbox: EventQueue, jobs: Arc<JobService>, config: &PipelineConfig) -> Self {
        Self {
            inbox,
            jobs,
            gate: ConcurrencyGate::new(config.concurrency.max(1)),
            poll_delay: config.poll_delay(),
        }
    }

    pub async fn run(self: Arc<Self>) {
        tracing::info!("Status consumer started");
        consume_gated(&self.inbox, self.poll_delay, &self.gate, |envelope| {
            let this = self.clone();
            async move { this.handle(envelope).await }
        })
        .await;
    }

    /// Apply one event. Returns the status written.
    pub async fn handle(&self, envelope: Envelope) -> Result<JobStatus, ConsumerError> {
        let (id, status) = status_for(&envelope.event)?;
        self.jobs.change_status(id, status).await?;
        Ok(status)
    }
}
