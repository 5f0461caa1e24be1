//! Statistic aggregators folding job events into pattern reports.

use relay_core::{JobEvent, JobRecord, PipelineConfig, Topic};
use serde_json::{Map, Value, json};

/// A stateful statistic over the job stream.
///
/// The worker feeding an aggregator looks the job up first, so `observe`
/// only ever sees events for known jobs, one at a time.
pub trait Aggregator: Send + 'static {
    /// Stable id, keying the report in the snapshot.
    fn id(&self) -> &'static str;

    /// Topics the aggregator subscribes to.
    fn topics(&self) -> &'static [Topic];

    fn observe(&mut self, event: &JobEvent, job: &JobRecord);

    /// Current report, published after every observed event.
    fn report(&self) -> Map<String, Value>;
}

/// The aggregators a pipeline runs by default.
pub fn default_aggregators(config: &PipelineConfig) -> Vec<Box<dyn Aggregator>> {
    vec![
        Box::new(MatchingJobs::first_letter_x()),
        Box::new(MatchingJobs::long_names(config.name_length_threshold)),
        Box::new(MatchingJobs::many_arguments(config.args_count_threshold)),
        Box::new(AverageTimeExecution::default()),
        Box::new(VulnerabilitiesTracker::default()),
        Box::new(JobRobustness::default()),
    ]
}

/// `numerator / denominator` rounded to two decimals, 0 for an empty denominator.
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64 * 100.0).round() / 100.0
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

const REGISTERED_AND_COMPLETED: &[Topic] = &[Topic::JobRegistered, Topic::JobCompleted];

/// Counts registered jobs matching a predicate and how many of them completed.
pub struct MatchingJobs {
    id: &'static str,
    pattern: String,
    matches: Box<dyn Fn(&JobRecord) -> bool + Send>,
    match_count: u64,
    success_match_count: u64,
}

impl MatchingJobs {
    pub fn new(
        id: &'static str,
        pattern: impl Into<String>,
        matches: impl Fn(&JobRecord) -> bool + Send + 'static,
    ) -> Self {
        Self {
            id,
            pattern: pattern.into(),
            matches: Box::new(matches),
            match_count: 0,
            success_match_count: 0,
        }
    }

    /// Jobs whose name starts with `X`.
    pub fn first_letter_x() -> Self {
        Self::new("FirstLetterX", "first letter x", |job| job.name.starts_with('X'))
    }

    /// Jobs whose name is longer than `threshold` characters.
    pub fn long_names(threshold: usize) -> Self {
        Self::new(
            "JobNameLength",
            format!("job name longer than {threshold}"),
            move |job| job.name.chars().count() > threshold,
        )
    }

    /// Jobs with more than `threshold` arguments.
    pub fn many_arguments(threshold: usize) -> Self {
        Self::new(
            "ArgumentsCount",
            format!("more than {threshold} arguments"),
            move |job| job.arguments.len() > threshold,
        )
    }
}

impl Aggregator for MatchingJobs {
    fn id(&self) -> &'static str {
        self.id
    }

    fn topics(&self) -> &'static [Topic] {
        REGISTERED_AND_COMPLETED
    }

    fn observe(&mut self, event: &JobEvent, job: &JobRecord) {
        if !(self.matches)(job) {
            return;
        }
        match event {
            JobEvent::JobRegistered { .. } => self.match_count += 1,
            JobEvent::JobCompleted { .. } => self.success_match_count += 1,
            _ => {}
        }
    }

    fn report(&self) -> Map<String, Value> {
        into_map(json!({
            "pattern": self.pattern,
            "matchCount": self.match_count,
            "successRate": rate(self.success_match_count, self.match_count),
        }))
    }
}

/// Average execution time of completed and of failed jobs.
#[derive(Debug, Default)]
pub struct AverageTimeExecution {
    total_jobs: u64,
    succeeded: u64,
    failed: u64,
    success_time: u64,
    failed_time: u64,
}

impl AverageTimeExecution {
    fn average(total: u64, count: u64) -> u64 {
        if count == 0 { 0 } else { total / count }
    }
}

impl Aggregator for AverageTimeExecution {
    fn id(&self) -> &'static str {
        "AverageTimeExecution"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::JobRegistered, Topic::JobCompleted, Topic::JobFailed]
    }

    fn observe(&mut self, event: &JobEvent, _job: &JobRecord) {
        match event {
            JobEvent::JobRegistered { .. } => self.total_jobs += 1,
            JobEvent::JobCompleted { execution_time, .. } => {
                self.succeeded += 1;
                self.success_time += execution_time;
            }
            JobEvent::JobFailed { execution_time, .. } => {
                self.failed += 1;
                self.failed_time += execution_time;
            }
            _ => {}
        }
    }

    fn report(&self) -> Map<String, Value> {
        into_map(json!({
            "pattern": "Average time execution",
            "totalJobs": self.total_jobs,
            "successJobs": self.succeeded,
            "failedJobs": self.failed,
            "successAverageMs": Self::average(self.success_time, self.succeeded),
            "failedAverageMs": Self::average(self.failed_time, self.failed),
        }))
    }
}

/// Jobs passing something that looks like a secret on the command line.
#[derive(Debug, Default)]
pub struct VulnerabilitiesTracker {
    total_jobs: u64,
    vulnerable: u64,
}

impl VulnerabilitiesTracker {
    const MARKER: &'static str = "secret";
}

impl Aggregator for VulnerabilitiesTracker {
    fn id(&self) -> &'static str {
        "VulnerabilitiesTracker"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::JobRegistered]
    }

    fn observe(&mut self, event: &JobEvent, job: &JobRecord) {
        if !matches!(event, JobEvent::JobRegistered { .. }) {
            return;
        }
        self.total_jobs += 1;
        if job.arguments.iter().any(|arg| arg.contains(Self::MARKER)) {
            self.vulnerable += 1;
        }
    }

    fn report(&self) -> Map<String, Value> {
        into_map(json!({
            "pattern": "Jobs with vulnerabilities",
            "totalJobs": self.total_jobs,
            "withVulnerabilities": self.vulnerable,
            "rate": rate(self.vulnerable, self.total_jobs),
        }))
    }
}

/// Share of finished jobs that ended without crashing.
#[derive(Debug, Default)]
pub struct JobRobustness {
    completed: u64,
    failed: u64,
    crashed: u64,
}

impl JobRobustness {
    /// Percentage of jobs that completed or failed rather than crashed.
    pub fn percent(&self) -> f64 {
        let finished = self.completed + self.failed;
        rate(finished * 100, finished + self.crashed)
    }

    fn verdict(percent: f64) -> &'static str {
        if percent > 90.0 {
            "Great"
        } else if percent > 70.0 {
            "Not bad"
        } else if percent < 40.0 {
            "Everything is on fire"
        } else {
            "Fix something"
        }
    }
}

impl Aggregator for JobRobustness {
    fn id(&self) -> &'static str {
        "JobRobustness"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::JobCompleted, Topic::JobFailed, Topic::JobCrashed]
    }

    fn observe(&mut self, event: &JobEvent, _job: &JobRecord) {
        match event {
            JobEvent::JobCompleted { .. } => self.completed += 1,
            JobEvent::JobFailed { .. } => self.failed += 1,
            JobEvent::JobCrashed { .. } => self.crashed += 1,
            _ => {}
        }
    }

    fn report(&self) -> Map<String, Value> {
        let percent = self.percent();
        into_map(json!({
            "pattern": "Job robustness",
            "completed": self.completed,
            "failed": self.failed,
            "crashed": self.crashed,
            "percent": percent,
            "status": Self::verdict(percent),
        }))
    }
}
