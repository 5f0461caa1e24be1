//! Supervisor actor and the pipeline composition root.

use std::sync::Arc;
use std::time::Duration;

use db::JobStorage;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use relay_core::{PipelineConfig, StatisticSnapshot, Topic};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::broker::Broker;
use crate::consumer::StatusConsumer;
use crate::lifecycle::JobService;
use crate::messages::{ComponentStatus, StatisticsMessage, SupervisorMessage};
use crate::processor::JobProcessor;
use crate::queue::{EventQueue, Outbox};
use crate::runner::JobRunner;
use crate::statistics::{
    AggregatorWorker, StatisticConsumer, StatisticsActor, default_aggregators,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to spawn actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("The {0} actor is not available")]
    ActorUnavailable(&'static str),

    #[error("Supervisor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A long running pipeline task.
pub type ComponentTask = BoxFuture<'static, ()>;

struct Component {
    name: String,
    handle: JoinHandle<()>,
    reported: bool,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    components: Vec<Component>,
    queues: Vec<EventQueue>,
    statistics: ActorRef<StatisticsMessage>,
}

/// Supervisor actor arguments.
pub struct SupervisorArgs {
    /// Named component tasks, spawned in order.
    pub tasks: Vec<(String, ComponentTask)>,
    /// Every queue in the pipeline, stopped on shutdown.
    pub queues: Vec<EventQueue>,
    /// Inbox of the statistics actor's consumer.
    pub statistics_inbox: EventQueue,
    pub poll_delay: Duration,
    pub tick_interval: Duration,
}

/// Runs every pipeline component as a task and owns the statistics actor.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting pipeline supervisor");

        let (statistics, _handle) =
            Actor::spawn_linked(None, StatisticsActor, (), myself.get_cell()).await?;

        let mut tasks = args.tasks;
        tasks.push((
            "statistic-consumer".to_string(),
            StatisticConsumer::new(args.statistics_inbox.clone(), statistics.clone(), args.poll_delay)
                .run()
                .boxed(),
        ));

        let components = tasks
            .into_iter()
            .map(|(name, task)| {
                tracing::debug!("Spawning component {}", name);
                Component {
                    name,
                    handle: tokio::spawn(task),
                    reported: false,
                }
            })
            .collect();

        let mut queues = args.queues;
        queues.push(args.statistics_inbox);

        // Start periodic tick
        let myself_clone = myself.clone();
        let tick_interval = args.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(SupervisorState {
            components,
            queues,
            statistics,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::Statistics { reply } => {
                let _ = reply.send(state.statistics.clone());
            }

            SupervisorMessage::Components { reply } => {
                let statuses = state
                    .components
                    .iter()
                    .map(|component| ComponentStatus {
                        name: component.name.clone(),
                        running: !component.handle.is_finished(),
                    })
                    .collect();
                let _ = reply.send(statuses);
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down pipeline");
                for queue in &state.queues {
                    queue.stop();
                }
                // Loops notice the stop flag within one poll interval.
                for component in state.components.iter_mut() {
                    if let Err(error) = (&mut component.handle).await {
                        tracing::error!("Component {} failed: {}", component.name, error);
                    }
                }
                state.statistics.stop(None);
                myself.stop(None);
            }

            SupervisorMessage::Tick => {
                for component in state.components.iter_mut() {
                    if component.handle.is_finished() && !component.reported {
                        tracing::warn!("Component {} exited before shutdown", component.name);
                        component.reported = true;
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                tracing::debug!("Child actor {} stopped: {:?}", cell.get_id(), reason);
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                tracing::error!("Child actor {} failed: {}", cell.get_id(), error);
            }
            _ => {}
        }
        Ok(())
    }
}

/// A running job pipeline.
///
/// Wiring, per topic:
///
/// | topic                 | subscribers |
/// |-----------------------|-------------|
/// | `jobRegistered`       | processor, statistics, aggregators |
/// | `jobRunning`          | none |
/// | `jobCompleted`        | status consumer, statistics, aggregators |
/// | `jobFailed`           | status consumer, statistics, aggregators |
/// | `jobRetried`          | status consumer |
/// | `jobCrashed`          | status consumer, aggregators |
/// | `statisticCalculated` | statistics |
///
/// Each aggregator only subscribes to the topics it declares.
pub struct Pipeline {
    jobs: Arc<JobService>,
    statistics: ActorRef<StatisticsMessage>,
    supervisor: ActorRef<SupervisorMessage>,
    handle: JoinHandle<()>,
}

impl Pipeline {
    /// Build the queues and the broker, then start every component.
    pub async fn start(
        config: PipelineConfig,
        storage: Arc<dyn JobStorage>,
        runner: Arc<dyn JobRunner>,
    ) -> Result<Self, PipelineError> {
        let poll_delay = config.poll_delay();

        let processor_inbox = EventQueue::new("processor-inbox");
        let status_inbox = EventQueue::new("status-inbox");
        let statistics_inbox = EventQueue::new("statistics-inbox");
        let aggregators: Vec<_> = default_aggregators(&config)
            .into_iter()
            .map(|aggregator| {
                let inbox = EventQueue::new(format!("{}-inbox", aggregator.id()));
                (aggregator, inbox)
            })
            .collect();

        let mut broker = Broker::builder()
            .subscribe(Topic::JobRegistered, processor_inbox.clone())
            .subscribe_all(&StatusConsumer::TOPICS, status_inbox.clone())
            .subscribe_all(&StatisticConsumer::TOPICS, statistics_inbox.clone());
        for (aggregator, inbox) in &aggregators {
            broker = broker.subscribe_all(aggregator.topics(), inbox.clone());
        }
        let broker = broker.build();
        tracing::debug!("Broker routes: {:?}", broker);

        let job_outbox = Outbox::new("job-outbox", broker.clone(), poll_delay);
        let processor_outbox = Outbox::new("processor-outbox", broker.clone(), poll_delay);
        let jobs = Arc::new(JobService::new(storage, job_outbox.clone()));
        let processor = Arc::new(JobProcessor::new(
            processor_inbox.clone(),
            processor_outbox.clone(),
            jobs.clone(),
            runner,
            &config,
        ));
        let status = Arc::new(StatusConsumer::new(status_inbox.clone(), jobs.clone(), &config));

        let mut tasks: Vec<(String, ComponentTask)> = vec![
            ("job-outbox".into(), job_outbox.clone().run().boxed()),
            ("processor-outbox".into(), processor_outbox.clone().run().boxed()),
            ("job-processor".into(), processor.run().boxed()),
            ("status-consumer".into(), status.run().boxed()),
        ];
        let mut queues = vec![
            job_outbox.queue().clone(),
            processor_outbox.queue().clone(),
            processor_inbox,
            status_inbox,
        ];

        for (aggregator, inbox) in aggregators {
            let id = aggregator.id();
            let outbox = Outbox::new(format!("{id}-outbox"), broker.clone(), poll_delay);
            let worker =
                AggregatorWorker::new(aggregator, inbox.clone(), outbox.clone(), jobs.clone(), poll_delay);

            tasks.push((format!("{id}-outbox"), outbox.clone().run().boxed()));
            tasks.push((id.to_string(), worker.run().boxed()));
            queues.push(inbox);
            queues.push(outbox.queue().clone());
        }

        let args = SupervisorArgs {
            tasks,
            queues,
            statistics_inbox,
            poll_delay,
            tick_interval: config.tick_interval(),
        };
        let (supervisor, handle) = Actor::spawn(None, Supervisor, args).await?;

        let statistics =
            match call(&supervisor, |reply| SupervisorMessage::Statistics { reply }).await {
                Ok(statistics) => statistics,
                Err(error) => {
                    supervisor.stop(None);
                    return Err(error);
                }
            };

        tracing::info!("Pipeline started");
        Ok(Self {
            jobs,
            statistics,
            supervisor,
            handle,
        })
    }

    pub fn jobs(&self) -> Arc<JobService> {
        self.jobs.clone()
    }

    pub fn statistics(&self) -> ActorRef<StatisticsMessage> {
        self.statistics.clone()
    }

    pub async fn snapshot(&self) -> Result<StatisticSnapshot, PipelineError> {
        crate::statistics::snapshot(&self.statistics).await
    }

    /// Liveness of every component task.
    pub async fn components(&self) -> Result<Vec<ComponentStatus>, PipelineError> {
        call(&self.supervisor, |reply| SupervisorMessage::Components { reply }).await
    }

    /// Stop every queue, wait for the loops to exit and stop the actors.
    ///
    /// Handlers already in flight keep running to completion.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        self.supervisor
            .send_message(SupervisorMessage::Shutdown)
            .map_err(|_| PipelineError::ActorUnavailable("supervisor"))?;
        self.handle.await?;
        tracing::info!("Pipeline stopped");
        Ok(())
    }
}

async fn call<T: Send + 'static>(
    actor: &ActorRef<SupervisorMessage>,
    message: impl FnOnce(RpcReplyPort<T>) -> SupervisorMessage,
) -> Result<T, PipelineError> {
    let (tx, rx) = ractor::concurrency::oneshot();
    actor
        .send_message(message(tx.into()))
        .map_err(|_| PipelineError::ActorUnavailable("supervisor"))?;
    rx.await
        .map_err(|_| PipelineError::ActorUnavailable("supervisor"))
}
