//! Job statistics: aggregators over the event stream and the totals actor.

mod actor;
mod aggregators;
mod worker;

pub use actor::{StatisticConsumer, StatisticsActor, snapshot};
pub use aggregators::{
    Aggregator, AverageTimeExecution, JobRobustness, MatchingJobs, VulnerabilitiesTracker,
    default_aggregators, rate,
};
pub use worker::AggregatorWorker;
