//! Polled FIFO event queues: consumer inboxes and producer outboxes.

use std::collections::VecDeque;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use relay_core::Envelope;

use crate::broker::{Broker, Subscriber};
use crate::gate::ConcurrencyGate;

/// An unbounded FIFO of events with a stop flag.
///
/// Clones share the same queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug)]
struct QueueInner {
    name: String,
    events: Mutex<VecDeque<Envelope>>,
    stopped: AtomicBool,
}

impl EventQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                events: Mutex::new(VecDeque::new()),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Append an event. Never blocks.
    pub fn add(&self, envelope: impl Into<Envelope>) {
        self.lock().push_back(envelope.into());
    }

    /// Take the oldest event without waiting.
    pub fn try_pop(&self) -> Option<Envelope> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Make every [`events`](Self::events) stream end at its next check.
    /// Events still queued are left behind.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Yield events in FIFO order, sleeping `poll_delay` whenever the queue
    /// is empty. The stop flag is checked before every dequeue.
    pub fn events(&self, poll_delay: Duration) -> impl Stream<Item = Envelope> + Send + 'static {
        stream::unfold(self.clone(), move |queue| async move {
            loop {
                if queue.is_stopped() {
                    return None;
                }
                if let Some(envelope) = queue.try_pop() {
                    return Some((envelope, queue));
                }
                tokio::time::sleep(poll_delay).await;
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Envelope>> {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Subscriber for EventQueue {
    fn deliver(&self, envelope: &Envelope) {
        self.add(envelope.clone());
    }
}

/// A producer's outgoing queue, drained into the broker by [`run`](Self::run).
#[derive(Debug, Clone)]
pub struct Outbox {
    queue: EventQueue,
    broker: Broker,
    poll_delay: Duration,
}

impl Outbox {
    pub fn new(name: impl Into<String>, broker: Broker, poll_delay: Duration) -> Self {
        Self {
            queue: EventQueue::new(name),
            broker,
            poll_delay,
        }
    }

    pub fn add(&self, envelope: impl Into<Envelope>) {
        self.queue.add(envelope);
    }

    pub fn stop(&self) {
        self.queue.stop();
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Publish queued events until stopped.
    pub async fn run(self) {
        let mut events = pin!(self.queue.events(self.poll_delay));
        while let Some(envelope) = events.next().await {
            if self.broker.publish(&envelope) == 0 {
                tracing::warn!(
                    outbox = self.queue.name(),
                    topic = %envelope.topic(),
                    "Event has no subscribers: {}",
                    envelope.event.description()
                );
            }
        }
        tracing::debug!("Outbox {} stopped", self.queue.name());
    }
}

/// Drain `inbox`, running `handler` for each event on its own task while
/// holding a permit from `gate`.
///
/// Dequeuing waits for a permit, so at most `gate.capacity()` handlers are
/// in flight. Handler errors are logged and never stop the loop.
pub async fn consume_gated<H, Fut, T, E>(
    inbox: &EventQueue,
    poll_delay: Duration,
    gate: &ConcurrencyGate,
    handler: H,
) where
    H: Fn(Envelope) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Debug + Send + 'static,
    E: Display + Send + 'static,
{
    let consumer = inbox.name().to_string();
    let mut events = pin!(inbox.events(poll_delay));
    while let Some(envelope) = events.next().await {
        let permit = gate.acquire().await;
        let topic = envelope.topic();
        let correlation_id = envelope.metadata.correlation_id.clone();
        let task = handler(envelope);
        let consumer = consumer.clone();

        tokio::spawn(async move {
            let _permit = permit;
            match task.await {
                Ok(outcome) => {
                    tracing::debug!(%consumer, %topic, ?outcome, "Event handled");
                }
                Err(error) => {
                    tracing::error!(
                        %consumer,
                        %topic,
                        correlation_id = ?correlation_id,
                        "Event handling failed: {}",
                        error
                    );
                }
            }
        });
    }
    tracing::debug!("Consumer {} stopped", consumer);
}
