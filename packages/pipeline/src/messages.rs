//! Message types for actor communication.

use relay_core::{Envelope, StatisticSnapshot};
use ractor::{ActorRef, RpcReplyPort};

/// Messages for the StatisticsActor.
#[derive(Debug)]
pub enum StatisticsMessage {
    /// Fold one event into the totals.
    Apply(Box<Envelope>),

    /// Get the current snapshot.
    Snapshot {
        reply: RpcReplyPort<StatisticSnapshot>,
    },
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Get the statistics actor.
    Statistics {
        reply: RpcReplyPort<ActorRef<StatisticsMessage>>,
    },

    /// Report liveness of every component task.
    Components {
        reply: RpcReplyPort<Vec<ComponentStatus>>,
    },

    /// Stop every queue and actor.
    Shutdown,

    /// Periodic tick for housekeeping.
    Tick,
}

/// Liveness of one component task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: String,
    pub running: bool,
}
