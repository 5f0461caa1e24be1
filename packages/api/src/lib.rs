//! HTTP server for the job relay.
//!
//! - `POST /jobs` creates a job
//! - `GET /jobs` lists all jobs
//! - `GET /stats` returns the statistic snapshot

pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use db::{DbError, JobStorage, MemoryJobStorage};
use pipeline::{Pipeline, PipelineError, ProcessRunner};
use thiserror::Error;

pub use config::{Config, ConfigError, StorageBackend};
pub use error::ApiError;
pub use routes::{AppState, router};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] DbError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open the configured storage backend.
pub async fn open_storage(backend: &StorageBackend) -> Result<Arc<dyn JobStorage>, DbError> {
    let storage: Arc<dyn JobStorage> = match backend {
        StorageBackend::Memory => Arc::new(MemoryJobStorage::new()),
        StorageBackend::Surreal(db_config) => {
            tracing::info!("Using SurrealDB storage at {}", db_config.endpoint);
            Arc::new(db::open(db_config).await?)
        }
    };
    Ok(storage)
}

/// Start the pipeline described by `config` with a process runner.
pub async fn start_pipeline(config: &Config) -> Result<Pipeline, StartupError> {
    let storage = open_storage(&config.storage).await?;
    let runner = Arc::new(ProcessRunner::new(config.runner.clone()));
    Ok(Pipeline::start(config.pipeline.clone(), storage, runner).await?)
}
