//! Aggregator worker: feeds one aggregator from its inbox and publishes its reports.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use relay_core::{Envelope, JobEvent};

use crate::lifecycle::JobService;
use crate::queue::{EventQueue, Outbox};
use crate::statistics::Aggregator;

/// Drives one aggregator: resolves the job behind each event, folds it in and
/// publishes the new report as `statisticCalculated`.
///
/// Events are handled sequentially so the counters need no locking.
pub struct AggregatorWorker {
    aggregator: Box<dyn Aggregator>,
    inbox: EventQueue,
    outbox: Outbox,
    jobs: Arc<JobService>,
    poll_delay: Duration,
}

impl AggregatorWorker {
    pub fn new(
        aggregator: Box<dyn Aggregator>,
        inbox: EventQueue,
        outbox: Outbox,
        jobs: Arc<JobService>,
        poll_delay: Duration,
    ) -> Self {
        Self {
            aggregator,
            inbox,
            outbox,
            jobs,
            poll_delay,
        }
    }

    pub async fn run(mut self) {
        let inbox = self.inbox.clone();
        let mut events = pin!(inbox.events(self.poll_delay));
        while let Some(envelope) = events.next().await {
            self.handle(envelope).await;
        }
        tracing::debug!("Aggregator {} stopped", self.aggregator.id());
    }

    /// Returns whether the event was counted.
    pub async fn handle(&mut self, envelope: Envelope) -> bool {
        let id = self.aggregator.id();
        let correlation_id = envelope.metadata.correlation_id;
        let Some(job_id) = envelope.event.job_id() else {
            tracing::warn!("{}: event {} has no job id", id, envelope.event.topic());
            return false;
        };

        let job = match self.jobs.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::error!(%job_id, correlation_id = ?correlation_id, "{}: job not found", id);
                return false;
            }
            Err(error) => {
                tracing::error!(%job_id, correlation_id = ?correlation_id, "{}: {}", id, error);
                return false;
            }
        };

        self.aggregator.observe(&envelope.event, &job);
        self.outbox.add(Envelope::new(
            JobEvent::StatisticCalculated {
                id: id.to_string(),
                report: self.aggregator.report(),
            },
            correlation_id,
        ));
        tracing::debug!(%job_id, "{} statistic calculated", id);
        true
    }
}
