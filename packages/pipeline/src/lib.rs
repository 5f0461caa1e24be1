//! Job execution and event pipeline.
//!
//! Jobs are created through the [`JobService`], announced on the event bus,
//! executed by the [`JobProcessor`] and folded back into the job store and the
//! statistics by downstream consumers. Every consumer drains its own polled
//! inbox; producers append to an outbox that publishes through the [`Broker`].
//!
//! # Architecture
//!
//! - `Supervisor` - Actor running every component as a task
//! - `StatisticsActor` - Actor holding the statistic totals
//! - `JobProcessor` - Runs registered jobs with retry and backoff
//! - `StatusConsumer` - Writes outcome statuses back to the store
//! - `AggregatorWorker` - Runs one statistic aggregator
//!
//! # Usage
//!
//! ```ignore
//! use pipeline::{Pipeline, ProcessRunner};
//!
//! let pipeline = Pipeline::start(config, storage, Arc::new(ProcessRunner::new("./run.sh"))).await?;
//! let job = pipeline.jobs().create(JobSpec::new("build", None)?, None).await?;
//! pipeline.shutdown().await?;
//! ```

mod broker;
mod consumer;
mod gate;
mod lifecycle;
mod messages;
mod processor;
mod queue;
mod runner;
pub mod statistics;
mod supervisor;

pub use broker::{Broker, BrokerBuilder, FnSubscriber, Subscriber};
pub use consumer::{ConsumerError, StatusConsumer, status_for};
pub use gate::{ConcurrencyGate, GatePermit};
pub use lifecycle::{JobService, JobServiceError};
pub use messages::{ComponentStatus, StatisticsMessage, SupervisorMessage};
pub use processor::{JobProcessor, ProcessOutcome, ProcessorError};
pub use queue::{EventQueue, Outbox, consume_gated};
pub use runner::{CORRELATION_ENV, FnRunner, JobRunner, ProcessRunner, RunOutcome, RunnerError, RunnerFuture};
pub use supervisor::{ComponentTask, Pipeline, PipelineError, Supervisor, SupervisorArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
