//! In-memory job storage.

use std::collections::BTreeMap;

use relay_core::{Job, JobId};
use tokio::sync::RwLock;

use crate::storage::{JobStorage, StorageFuture};

/// Id-keyed map behind a read-write lock.
///
/// Ids are ULIDs, so iteration order follows creation time.
#[derive(Debug, Default)]
pub struct MemoryJobStorage {
    jobs: RwLock<BTreeMap<JobId, Job>>,
}

impl MemoryJobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStorage for MemoryJobStorage {
    fn save<'a>(&'a self, job: &'a Job) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.jobs.write().await.insert(job.id, job.clone());
            Ok(())
        })
    }

    fn get(&self, id: JobId) -> StorageFuture<'_, Option<Job>> {
        Box::pin(async move { Ok(self.jobs.read().await.get(&id).cloned()) })
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Job>> {
        Box::pin(async move { Ok(self.jobs.read().await.values().cloned().collect()) })
    }
}
