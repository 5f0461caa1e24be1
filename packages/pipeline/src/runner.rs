//! Job runners: execute one attempt of a job and classify how it ended.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

/// Environment variable carrying the correlation id into the child process.
pub const CORRELATION_ENV: &str = "JOB_CORRELATION_ID";

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit code 0.
    Success,
    /// Exit code 1. Final, never retried.
    Failed,
    /// Any other exit. Eligible for retry.
    Crashed,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Future type for runner attempts.
pub type RunnerFuture<'a> = Pin<Box<dyn Future<Output = Result<RunOutcome, RunnerError>> + Send + 'a>>;

/// Executes jobs.
///
/// Implementations must be safe to call concurrently.
pub trait JobRunner: Send + Sync + 'static {
    fn run<'a>(
        &'a self,
        name: &'a str,
        args: &'a [String],
        correlation_id: Option<&'a str>,
    ) -> RunnerFuture<'a>;
}

/// Runs `<program> <name> <args...>` as a child process with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl JobRunner for ProcessRunner {
    fn run<'a>(
        &'a self,
        name: &'a str,
        args: &'a [String],
        correlation_id: Option<&'a str>,
    ) -> RunnerFuture<'a> {
        Box::pin(async move {
            let mut command = Command::new(&self.program);
            command
                .arg(name)
                .args(args)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
            if let Some(id) = correlation_id {
                command.env(CORRELATION_ENV, id);
            }

            let status = command.status().await.map_err(|source| RunnerError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

            Ok(match status.code() {
                Some(0) => RunOutcome::Success,
                Some(1) => RunOutcome::Failed,
                code => {
                    tracing::debug!("Job {} exited abnormally: {:?}", name, code);
                    RunOutcome::Crashed
                }
            })
        })
    }
}

/// A closure based runner.
pub struct FnRunner<F>
where
    F: Fn(&str, &[String]) -> RunnerFuture<'static> + Send + Sync + 'static,
{
    run: F,
}

impl<F> FnRunner<F>
where
    F: Fn(&str, &[String]) -> RunnerFuture<'static> + Send + Sync + 'static,
{
    pub fn new(run: F) -> Self {
        Self { run }
    }
}

impl<F> JobRunner for FnRunner<F>
where
    F: Fn(&str, &[String]) -> RunnerFuture<'static> + Send + Sync + 'static,
{
    fn run<'a>(
        &'a self,
        name: &'a str,
        args: &'a [String],
        _correlation_id: Option<&'a str>,
    ) -> RunnerFuture<'a> {
        (self.run)(name, args)
    }
}
