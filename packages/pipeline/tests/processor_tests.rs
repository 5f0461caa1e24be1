mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use common::ScriptedRunner;
use pipeline::{
    Broker, EventQueue, FnRunner, JobProcessor, JobRunner, Outbox, ProcessorError, RunOutcome,
    RunnerError,
};
use relay_core::{Envelope, JobEvent, JobId, JobRecord, JobStatus, PipelineConfig, Topic};

struct Harness {
    processor: Arc<JobProcessor>,
    inbox: EventQueue,
    outbox: EventQueue,
    job: JobRecord,
}

async fn harness(runner: Arc<dyn JobRunner>, config: PipelineConfig) -> Harness {
    let (jobs, _job_outbox) = common::job_service();
    let job = jobs
        .create(common::spec("build", &["--release"]), None)
        .await
        .expect("job created");

    let inbox = EventQueue::new("processor-inbox");
    let outbox = Outbox::new("processor-outbox", Broker::default(), config.poll_delay());
    let events = outbox.queue().clone();
    let processor = JobProcessor::new(inbox.clone(), outbox, jobs, runner, &config);

    Harness {
        processor: Arc::new(processor),
        inbox,
        outbox: events,
        job,
    }
}

fn topics(events: &[JobEvent]) -> Vec<Topic> {
    events.iter().map(JobEvent::topic).collect()
}

#[tokio::test]
async fn test_successful_job_runs_once() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::always(RunOutcome::Success));
    let h = harness(runner.clone(), common::fast_config()).await;

    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(runner.calls(), 1);

    let events = common::events(&h.outbox);
    assert_eq!(topics(&events), vec![Topic::JobRunning, Topic::JobCompleted]);
    assert_eq!(events[1].job_id(), Some(h.job.id));
    Ok(())
}

#[tokio::test]
async fn test_failed_job_is_not_retried() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::always(RunOutcome::Failed));
    let h = harness(runner.clone(), common::fast_config()).await;

    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(runner.calls(), 1);
    assert_eq!(
        topics(&common::events(&h.outbox)),
        vec![Topic::JobRunning, Topic::JobFailed]
    );
    Ok(())
}

#[tokio::test]
async fn test_crashing_job_exhausts_retries() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::always(RunOutcome::Crashed));
    let h = harness(runner.clone(), common::fast_config().with_retries(2, 1)).await;

    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    assert_eq!(outcome.status, JobStatus::Crashed);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(runner.calls(), 3);

    let events = common::events(&h.outbox);
    assert_eq!(
        topics(&events),
        vec![
            Topic::JobRunning,
            Topic::JobRetried,
            Topic::JobRunning,
            Topic::JobRetried,
            Topic::JobRunning,
            Topic::JobCrashed,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_crash_time_spans_backoff() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::always(RunOutcome::Crashed));
    let h = harness(runner, common::fast_config().with_retries(2, 60)).await;

    let started = Instant::now();
    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    let wall = u64::try_from(started.elapsed().as_millis())?;
    assert_eq!(outcome.status, JobStatus::Crashed);

    let events = common::events(&h.outbox);
    let crash = events.last().and_then(JobEvent::execution_time).expect("crash time");
    assert!(crash >= 2 * 60, "crash time {crash}ms misses the backoff");
    assert!(crash <= wall);
    Ok(())
}

#[tokio::test]
async fn test_crash_then_success_completes() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::sequence(
        &[RunOutcome::Crashed],
        RunOutcome::Success,
    ));
    let h = harness(runner.clone(), common::fast_config()).await;

    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(
        topics(&common::events(&h.outbox)),
        vec![
            Topic::JobRunning,
            Topic::JobRetried,
            Topic::JobRunning,
            Topic::JobCompleted
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_zero_retries_crash_immediately() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::always(RunOutcome::Crashed));
    let h = harness(runner.clone(), common::fast_config().with_retries(0, 1)).await;

    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    assert_eq!(outcome.status, JobStatus::Crashed);
    assert_eq!(runner.calls(), 1);
    assert_eq!(
        topics(&common::events(&h.outbox)),
        vec![Topic::JobRunning, Topic::JobCrashed]
    );
    Ok(())
}

#[tokio::test]
async fn test_runner_error_counts_as_crash() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(FnRunner::new(|_name: &str, _args: &[String]| {
        Box::pin(async {
            Err::<RunOutcome, _>(RunnerError::Spawn {
                program: "missing".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }) as pipeline::RunnerFuture<'static>
    }));
    let h = harness(runner, common::fast_config().with_retries(1, 1)).await;

    let outcome = h.processor.handle(common::registered(&h.job, None)).await?;
    assert_eq!(outcome.status, JobStatus::Crashed);
    assert_eq!(outcome.attempts, 2);
    Ok(())
}

#[tokio::test]
async fn test_correlation_id_reaches_runner_and_events() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::sequence(
        &[RunOutcome::Crashed],
        RunOutcome::Success,
    ));
    let h = harness(runner.clone(), common::fast_config()).await;

    h.processor
        .handle(common::registered(&h.job, Some("req-42")))
        .await?;

    let published = common::drain(&h.outbox);
    assert_eq!(published.len(), 4);
    assert!(published.iter().all(|e| e.correlation_id() == Some("req-42")));
    assert_eq!(
        runner.correlation_ids(),
        vec![Some("req-42".to_string()), Some("req-42".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_rejects_other_events_and_unknown_jobs() -> Result<(), Box<dyn Error>> {
    let runner = Arc::new(ScriptedRunner::always(RunOutcome::Success));
    let h = harness(runner.clone(), common::fast_config()).await;

    let running = Envelope::from(JobEvent::JobRunning { id: h.job.id });
    let result = h.processor.handle(running).await;
    assert!(matches!(
        result,
        Err(ProcessorError::UnexpectedEvent(Topic::JobRunning))
    ));

    let unknown = Envelope::from(JobEvent::JobRegistered {
        id: JobId::new(),
        status: JobStatus::Queued,
    });
    let result = h.processor.handle(unknown).await;
    assert!(matches!(result, Err(ProcessorError::JobNotFound(_))));

    assert_eq!(runner.calls(), 0);
    assert!(h.outbox.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_run_loop_respects_concurrency() -> Result<(), Box<dyn Error>> {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runner = {
        let (active, peak) = (active.clone(), peak.clone());
        Arc::new(FnRunner::new(move |_name: &str, _args: &[String]| {
            let (active, peak) = (active.clone(), peak.clone());
            Box::pin(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, RunnerError>(RunOutcome::Success)
            }) as pipeline::RunnerFuture<'static>
        }))
    };
    let h = harness(runner, common::fast_config().with_concurrency(2)).await;

    for _ in 0..5 {
        h.inbox.add(common::registered(&h.job, None));
    }
    let task = tokio::spawn(h.processor.clone().run());

    let outbox = h.outbox.clone();
    let completed = Arc::new(AtomicUsize::new(0));
    let done = common::wait_for(|| {
        let (outbox, completed) = (outbox.clone(), completed.clone());
        async move {
            let finished = common::events(&outbox)
                .iter()
                .filter(|event| event.topic() == Topic::JobCompleted)
                .count();
            completed.fetch_add(finished, Ordering::SeqCst) + finished == 5
        }
    })
    .await;
    assert!(done);

    h.inbox.stop();
    task.await?;
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(h.processor.gate().available_permits(), 2);
    Ok(())
}
