//! Statistics actor and the consumer feeding it.

use std::pin::pin;
use std::time::Duration;

use futures_util::StreamExt;
use relay_core::{Envelope, JobEvent, StatisticSnapshot, StatisticTotals, Topic};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::StatisticsMessage;
use crate::queue::EventQueue;
use crate::supervisor::PipelineError;

/// Holds the statistic totals. All updates and reads go through its mailbox.
pub struct StatisticsActor;

impl Actor for StatisticsActor {
    type Msg = StatisticsMessage;
    type State = StatisticTotals;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting statistics actor");
        Ok(StatisticTotals::default())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StatisticsMessage::Apply(envelope) => apply(state, envelope.event),
            StatisticsMessage::Snapshot { reply } => {
                let _ = reply.send(state.snapshot());
            }
        }
        Ok(())
    }
}

fn apply(totals: &mut StatisticTotals, event: JobEvent) {
    match event {
        JobEvent::JobRegistered { .. } => totals.total_jobs += 1,
        JobEvent::JobCompleted { .. } => totals.total_success_jobs += 1,
        JobEvent::JobFailed { .. } => totals.total_failed_jobs += 1,
        JobEvent::StatisticCalculated { id, report } => totals.set_pattern(id, report),
        other => tracing::debug!("Statistics ignore {} events", other.topic()),
    }
}

/// Read the current snapshot from a statistics actor.
pub async fn snapshot(
    statistics: &ActorRef<StatisticsMessage>,
) -> Result<StatisticSnapshot, PipelineError> {
    let (tx, rx) = ractor::concurrency::oneshot();
    statistics
        .send_message(StatisticsMessage::Snapshot { reply: tx.into() })
        .map_err(|_| PipelineError::ActorUnavailable("statistics"))?;
    rx.await
        .map_err(|_| PipelineError::ActorUnavailable("statistics"))
}

/// Forwards inbox events to the statistics actor, one at a time.
pub struct StatisticConsumer {
    inbox: EventQueue,
    statistics: ActorRef<StatisticsMessage>,
    poll_delay: Duration,
}

impl StatisticConsumer {
    pub const TOPICS: [Topic; 4] = [
        Topic::JobRegistered,
        Topic::JobCompleted,
        Topic::JobFailed,
        Topic::StatisticCalculated,
    ];

    pub fn new(
        inbox: EventQueue,
        statistics: ActorRef<StatisticsMessage>,
        poll_delay: Duration,
    ) -> Self {
        Self {
            inbox,
            statistics,
            poll_delay,
        }
    }

    pub async fn run(self) {
        let mut events = pin!(self.inbox.events(self.poll_delay));
        while let Some(envelope) = events.next().await {
            if self.forward(envelope).is_err() {
                tracing::warn!("Statistics actor stopped, dropping statistic events");
                break;
            }
        }
        tracing::debug!("Statistic consumer stopped");
    }

    fn forward(&self, envelope: Envelope) -> Result<(), PipelineError> {
        self.statistics
            .send_message(StatisticsMessage::Apply(Box::new(envelope)))
            .map_err(|_| PipelineError::ActorUnavailable("statistics"))
    }
}
