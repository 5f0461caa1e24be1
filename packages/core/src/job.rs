//! Job domain types for work items submitted to the pipeline.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{UnknownStatus, ValidationError};

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job was accepted and waits for the processor.
    #[default]
    Queued,
    /// An attempt is executing.
    Running,
    /// The runner reported success.
    Completed,
    /// The runner reported a definitive failure.
    Failed,
    /// An attempt crashed and another one is scheduled.
    Retried,
    /// Every allowed attempt crashed.
    Crashed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Retried,
        JobStatus::Crashed,
    ];

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Crashed
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retried => "retried",
            JobStatus::Crashed => "crashed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Validated job submission: a non-empty name and non-empty arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    name: String,
    args: Vec<String>,
}

impl JobSpec {
    /// Validate a submission. Missing arguments mean an empty list.
    pub fn new(name: impl Into<String>, args: Option<Vec<String>>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let args = args.unwrap_or_default();
        if let Some(position) = args.iter().position(String::is_empty) {
            return Err(ValidationError::EmptyArgument { position });
        }

        Ok(Self { name, args })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// A job is a named command with arguments tracked through its lifecycle.
///
/// Everything except `status` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Name passed to the runner as the first argument.
    pub name: String,
    /// Remaining runner arguments, in order.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Current status.
    pub status: JobStatus,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job from a validated spec.
    pub fn new(spec: JobSpec) -> Self {
        Self {
            id: JobId::new(),
            name: spec.name,
            arguments: spec.args,
            status: JobStatus::Queued,
            created_at: Utc::now(),
        }
    }

    /// Project the job into its transfer record.
    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            id: self.id,
            name: self.name.clone(),
            arguments: self.arguments.clone(),
            status: self.status,
        }
    }
}

/// Plain read projection of a job, as served to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub name: String,
    pub arguments: Vec<String>,
    pub status: JobStatus,
}
