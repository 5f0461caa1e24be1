//! Job processor: runs registered jobs with retry and backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::{Envelope, JobEvent, JobId, JobStatus, PipelineConfig, Topic};
use thiserror::Error;

use crate::gate::ConcurrencyGate;
use crate::lifecycle::{JobService, JobServiceError};
use crate::queue::{EventQueue, Outbox, consume_gated};
use crate::runner::{JobRunner, RunOutcome};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor does not handle {0} events")]
    UnexpectedEvent(Topic),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error(transparent)]
    Jobs(#[from] JobServiceError),
}

/// Final result of processing one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Terminal status announced for the job.
    pub status: JobStatus,
    /// Attempts made, including the first.
    pub attempts: u32,
}

/// Consumes `jobRegistered` events and executes each job through the runner.
///
/// Events emitted per job:
/// - `jobRunning` before every attempt
/// - `jobCompleted` or `jobFailed` with the attempt's time, ending processing
/// - `jobRetried` with the attempt's time after a crash with attempts left
/// - `jobCrashed` with the time since the first attempt, backoff included,
///   once attempts are used up
pub struct JobProcessor {
    inbox: EventQueue,
    outbox: Outbox,
    jobs: Arc<JobService>,
    runner: Arc<dyn JobRunner>,
    gate: ConcurrencyGate,
    max_attempts: u32,
    backoff: Duration,
    poll_delay: Duration,
}

impl JobProcessor {
    pub fn new(
        inbox: EventQueue,
        outbox: Outbox,
        jobs: Arc<JobService>,
        runner: Arc<dyn JobRunner>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            inbox,
            outbox,
            jobs,
            runner,
            gate: ConcurrencyGate::new(config.concurrency.max(1)),
            max_attempts: config.max_attempts().max(1),
            backoff: config.retry_backoff(),
            poll_delay: config.poll_delay(),
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Process inbox events until the inbox is stopped.
    pub async fn run(self: Arc<Self>) {
        tracing::info!("Job processor started with {} slots", self.gate.capacity());
        consume_gated(&self.inbox, self.poll_delay, &self.gate, |envelope| {
            let this = self.clone();
            async move { this.handle(envelope).await }
        })
        .await;
    }

    /// Execute the job announced by a `jobRegistered` event.
    pub async fn handle(&self, envelope: Envelope) -> Result<ProcessOutcome, ProcessorError> {
        let JobEvent::JobRegistered { id, .. } = envelope.event else {
            return Err(ProcessorError::UnexpectedEvent(envelope.topic()));
        };
        let correlation_id = envelope.metadata.correlation_id;

        let job = self
            .jobs
            .get(id)
            .await?
            .ok_or(ProcessorError::JobNotFound(id))?;

        let first_started = Instant::now();
        for attempt in 1..=self.max_attempts {
            self.emit(JobEvent::JobRunning { id }, &correlation_id);

            let started = Instant::now();
            let result = self
                .runner
                .run(&job.name, &job.arguments, correlation_id.as_deref())
                .await;
            let execution_time = elapsed_ms(started);

            let outcome = result.unwrap_or_else(|error| {
                tracing::error!(job_id = %id, "Runner error, counted as crash: {}", error);
                RunOutcome::Crashed
            });

            match outcome {
                RunOutcome::Success => {
                    self.emit(JobEvent::JobCompleted { id, execution_time }, &correlation_id);
                    return Ok(ProcessOutcome {
                        status: JobStatus::Completed,
                        attempts: attempt,
                    });
                }
                RunOutcome::Failed => {
                    self.emit(JobEvent::JobFailed { id, execution_time }, &correlation_id);
                    return Ok(ProcessOutcome {
                        status: JobStatus::Failed,
                        attempts: attempt,
                    });
                }
                RunOutcome::Crashed if attempt < self.max_attempts => {
                    tracing::warn!(
                        job_id = %id,
                        "Job {} crashed on attempt {}/{}, retrying",
                        job.name,
                        attempt,
                        self.max_attempts
                    );
                    self.emit(JobEvent::JobRetried { id, execution_time }, &correlation_id);
                    tokio::time::sleep(self.backoff).await;
                }
                RunOutcome::Crashed => {}
            }
        }

        self.emit(
            JobEvent::JobCrashed {
                id,
                execution_time: elapsed_ms(first_started),
            },
            &correlation_id,
        );
        Ok(ProcessOutcome {
            status: JobStatus::Crashed,
            attempts: self.max_attempts,
        })
    }

    fn emit(&self, event: JobEvent, correlation_id: &Option<String>) {
        self.outbox.add(Envelope::new(event, correlation_id.clone()));
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
