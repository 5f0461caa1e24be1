use db::{DbConfig, DbError, repositories::JobRepository};
use relay_core::{Job, JobSpec};

/// Every call opens its own in-memory datastore.
pub async fn setup_repository() -> Result<JobRepository, DbError> {
    db::open(&DbConfig::memory().with_namespace("test")).await
}

pub fn job(name: &str, args: &[&str]) -> Job {
    let args = args.iter().map(|a| a.to_string()).collect();
    Job::new(JobSpec::new(name, Some(args)).expect("valid spec"))
}
