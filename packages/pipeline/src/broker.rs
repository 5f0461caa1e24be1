//! Topic based fan-out of events to subscribers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use relay_core::{Envelope, Topic};

/// Receives every event published on the topics it is subscribed to.
///
/// Delivery must not block: subscribers append to a queue and return.
pub trait Subscriber: Send + Sync + 'static {
    fn deliver(&self, envelope: &Envelope);
}

/// A closure based subscriber.
pub struct FnSubscriber<F>
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    deliver: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    pub fn new(deliver: F) -> Self {
        Self { deliver }
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    fn deliver(&self, envelope: &Envelope) {
        (self.deliver)(envelope)
    }
}

type Routes = HashMap<Topic, Vec<Arc<dyn Subscriber>>>;

/// Collects subscriptions before the broker starts routing.
#[derive(Default)]
pub struct BrokerBuilder {
    routes: Routes,
}

impl BrokerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one topic.
    pub fn subscribe<S: Subscriber>(self, topic: Topic, subscriber: S) -> Self {
        self.subscribe_shared(topic, Arc::new(subscriber))
    }

    /// Subscribe one subscriber to several topics.
    pub fn subscribe_all<S: Subscriber>(mut self, topics: &[Topic], subscriber: S) -> Self {
        let subscriber: Arc<dyn Subscriber> = Arc::new(subscriber);
        for topic in topics {
            self = self.subscribe_shared(*topic, subscriber.clone());
        }
        self
    }

    pub fn subscribe_shared(mut self, topic: Topic, subscriber: Arc<dyn Subscriber>) -> Self {
        self.routes.entry(topic).or_default().push(subscriber);
        self
    }

    /// Freeze the subscription table.
    pub fn build(self) -> Broker {
        Broker {
            routes: Arc::new(self.routes),
        }
    }
}

/// Routes published events to every subscriber of their topic,
/// in subscription order. The table cannot change once built.
#[derive(Clone, Default)]
pub struct Broker {
    routes: Arc<Routes>,
}

impl Broker {
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::new()
    }

    /// Deliver to all subscribers of the event's topic.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, envelope: &Envelope) -> usize {
        let Some(subscribers) = self.routes.get(&envelope.topic()) else {
            return 0;
        };
        for subscriber in subscribers {
            subscriber.deliver(envelope);
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.routes.get(&topic).map_or(0, Vec::len)
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for topic in Topic::ALL {
            map.entry(&topic.as_str(), &self.subscriber_count(topic));
        }
        map.finish()
    }
}
