#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use db::{DbError, JobStorage, MemoryJobStorage, StorageFuture};
use pipeline::{Broker, EventQueue, JobRunner, JobService, Outbox, RunOutcome, RunnerFuture};
use relay_core::{Envelope, Job, JobEvent, JobId, JobRecord, JobSpec, JobStatus, PipelineConfig};

/// Millisecond polling and backoff so tests stay fast.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_poll_delay(2)
        .with_retries(2, 1)
}

/// A job service over memory storage whose outbox is never drained.
pub fn job_service() -> (Arc<JobService>, EventQueue) {
    let outbox = Outbox::new("job-outbox", Broker::default(), Duration::from_millis(2));
    let queue = outbox.queue().clone();
    let service = JobService::new(Arc::new(MemoryJobStorage::new()), outbox);
    (Arc::new(service), queue)
}

pub fn spec(name: &str, args: &[&str]) -> JobSpec {
    let args = args.iter().map(|a| a.to_string()).collect();
    JobSpec::new(name, Some(args)).expect("valid spec")
}

pub fn registered(job: &JobRecord, correlation_id: Option<&str>) -> Envelope {
    Envelope::new(
        JobEvent::JobRegistered {
            id: job.id,
            status: job.status,
        },
        correlation_id.map(str::to_string),
    )
}

/// Everything currently buffered in a queue.
pub fn drain(queue: &EventQueue) -> Vec<Envelope> {
    std::iter::from_fn(|| queue.try_pop()).collect()
}

pub fn events(queue: &EventQueue) -> Vec<JobEvent> {
    drain(queue).into_iter().map(|envelope| envelope.event).collect()
}

/// Poll `check` every 10ms for up to two seconds.
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub async fn status_of(jobs: &JobService, id: JobId) -> Option<JobStatus> {
    jobs.get(id).await.ok().flatten().map(|job| job.status)
}

/// Returns scripted outcomes, then repeats the fallback.
pub struct ScriptedRunner {
    outcomes: Mutex<VecDeque<RunOutcome>>,
    fallback: RunOutcome,
    calls: AtomicUsize,
    correlation_ids: Mutex<Vec<Option<String>>>,
}

impl ScriptedRunner {
    pub fn always(outcome: RunOutcome) -> Self {
        Self::sequence(&[], outcome)
    }

    pub fn sequence(outcomes: &[RunOutcome], fallback: RunOutcome) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            correlation_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn correlation_ids(&self) -> Vec<Option<String>> {
        self.correlation_ids.lock().unwrap().clone()
    }
}

impl JobRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        _name: &'a str,
        _args: &'a [String],
        correlation_id: Option<&'a str>,
    ) -> RunnerFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.correlation_ids
            .lock()
            .unwrap()
            .push(correlation_id.map(str::to_string));
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        Box::pin(async move { Ok(outcome) })
    }
}

/// Storage whose writes always fail.
#[derive(Default)]
pub struct FailingStorage;

impl JobStorage for FailingStorage {
    fn save<'a>(&'a self, _job: &'a Job) -> StorageFuture<'a, ()> {
        Box::pin(async { Err(DbError::Query("disk full".into())) })
    }

    fn get(&self, _id: JobId) -> StorageFuture<'_, Option<Job>> {
        Box::pin(async { Ok(None) })
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Job>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Memory storage with a slow `get`, recording how many status changes sit
/// between their read and their write at once.
#[derive(Default)]
pub struct SlowReadStorage {
    inner: MemoryJobStorage,
    pending: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowReadStorage {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl JobStorage for SlowReadStorage {
    fn save<'a>(&'a self, job: &'a Job) -> StorageFuture<'a, ()> {
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.inner.save(job)
    }

    fn get(&self, id: JobId) -> StorageFuture<'_, Option<Job>> {
        let pending = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(pending, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.get(id).await
        })
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Job>> {
        self.inner.get_all()
    }
}
