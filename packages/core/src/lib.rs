//! Core domain types for the job relay.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobSpec and JobStatus for work items
//! - JobEvent and Envelope for the broker's topic vocabulary
//! - PipelineConfig and the statistics snapshot

mod config;
mod error;
mod events;
mod job;
mod stats;

pub use config::PipelineConfig;
pub use error::{UnknownStatus, ValidationError};
pub use events::{Envelope, JobEvent, Metadata, Topic};
pub use job::{Job, JobId, JobRecord, JobSpec, JobStatus};
pub use stats::{StatisticSnapshot, StatisticTotals};
