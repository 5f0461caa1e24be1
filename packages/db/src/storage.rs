//! Storage boundary for job records.

use std::future::Future;
use std::pin::Pin;

use relay_core::{Job, JobId};

use crate::DbError;

/// Future type returned by storage operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'a>>;

/// Key-value store for jobs keyed by id.
///
/// Implementations are shared between tasks and must serialize their own
/// reads and writes.
pub trait JobStorage: Send + Sync + 'static {
    /// Insert or overwrite a job.
    fn save<'a>(&'a self, job: &'a Job) -> StorageFuture<'a, ()>;

    /// Get a job by ID, `None` when absent.
    fn get(&self, id: JobId) -> StorageFuture<'_, Option<Job>>;

    /// List every stored job in creation order.
    fn get_all(&self) -> StorageFuture<'_, Vec<Job>>;
}
