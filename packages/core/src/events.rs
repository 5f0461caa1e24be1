//! Event types carried between queues over the broker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{JobId, JobStatus};

/// Topic names forming the stable wire vocabulary of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    JobRegistered,
    JobRunning,
    JobCompleted,
    JobFailed,
    JobRetried,
    JobCrashed,
    StatisticCalculated,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::JobRegistered,
        Topic::JobRunning,
        Topic::JobCompleted,
        Topic::JobFailed,
        Topic::JobRetried,
        Topic::JobCrashed,
        Topic::StatisticCalculated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::JobRegistered => "jobRegistered",
            Topic::JobRunning => "jobRunning",
            Topic::JobCompleted => "jobCompleted",
            Topic::JobFailed => "jobFailed",
            Topic::JobRetried => "jobRetried",
            Topic::JobCrashed => "jobCrashed",
            Topic::StatisticCalculated => "statisticCalculated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted while a job moves through the pipeline.
///
/// Execution times are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobEvent {
    /// A job was stored and waits for execution.
    JobRegistered { id: JobId, status: JobStatus },
    /// An attempt is about to start.
    JobRunning { id: JobId },
    /// The runner reported success.
    JobCompleted { id: JobId, execution_time: u64 },
    /// The runner reported a definitive failure.
    JobFailed { id: JobId, execution_time: u64 },
    /// An attempt crashed; another one follows after the backoff.
    JobRetried { id: JobId, execution_time: u64 },
    /// The last allowed attempt crashed. Time runs from the first attempt, backoff included.
    JobCrashed { id: JobId, execution_time: u64 },
    /// An aggregator published its latest report.
    StatisticCalculated {
        id: String,
        #[serde(flatten)]
        report: Map<String, Value>,
    },
}

impl JobEvent {
    /// Get the topic this event is published under.
    pub fn topic(&self) -> Topic {
        match self {
            JobEvent::JobRegistered { .. } => Topic::JobRegistered,
            JobEvent::JobRunning { .. } => Topic::JobRunning,
            JobEvent::JobCompleted { .. } => Topic::JobCompleted,
            JobEvent::JobFailed { .. } => Topic::JobFailed,
            JobEvent::JobRetried { .. } => Topic::JobRetried,
            JobEvent::JobCrashed { .. } => Topic::JobCrashed,
            JobEvent::StatisticCalculated { .. } => Topic::StatisticCalculated,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::JobRegistered { id, .. }
            | JobEvent::JobRunning { id }
            | JobEvent::JobCompleted { id, .. }
            | JobEvent::JobFailed { id, .. }
            | JobEvent::JobRetried { id, .. }
            | JobEvent::JobCrashed { id, .. } => Some(*id),
            JobEvent::StatisticCalculated { .. } => None,
        }
    }

    /// Get the reported execution time, for outcome events.
    pub fn execution_time(&self) -> Option<u64> {
        match self {
            JobEvent::JobCompleted { execution_time, .. }
            | JobEvent::JobFailed { execution_time, .. }
            | JobEvent::JobRetried { execution_time, .. }
            | JobEvent::JobCrashed { execution_time, .. } => Some(*execution_time),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobRegistered { id, .. } => format!("Job {} registered", id),
            JobEvent::JobRunning { id } => format!("Job {} running", id),
            JobEvent::JobCompleted { id, execution_time } => {
                format!("Job {} completed in {}ms", id, execution_time)
            }
            JobEvent::JobFailed { id, execution_time } => {
                format!("Job {} failed after {}ms", id, execution_time)
            }
            JobEvent::JobRetried { id, execution_time } => {
                format!("Job {} crashed after {}ms (will retry)", id, execution_time)
            }
            JobEvent::JobCrashed { id, execution_time } => {
                format!("Job {} crashed, gave up after {}ms", id, execution_time)
            }
            JobEvent::StatisticCalculated { id, .. } => format!("Statistic {} calculated", id),
        }
    }
}

/// Tracing metadata threaded through every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(
        rename = "correlationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.correlation_id.is_none()
    }
}

/// An event plus its metadata, as stored in queues and delivered by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: JobEvent,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Envelope {
    pub fn new(event: JobEvent, correlation_id: Option<String>) -> Self {
        Self {
            event,
            metadata: Metadata { correlation_id },
        }
    }

    pub fn topic(&self) -> Topic {
        self.event.topic()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.correlation_id.as_deref()
    }
}

impl From<JobEvent> for Envelope {
    fn from(event: JobEvent) -> Self {
        Self::new(event, None)
    }
}
