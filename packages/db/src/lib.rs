//! Job storage for the relay.
//!
//! This crate defines the storage boundary and its two implementations:
//! an in-memory map and a SurrealDB repository.
//!
//! # Features
//!
//! - `memory` (default): SurrealDB runs with in-memory storage
//! - `rocksdb`: Use RocksDB for file-based storage

mod connection;
mod memory;
mod schema;
mod storage;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use memory::MemoryJobStorage;
pub use schema::init_schema;
pub use storage::{JobStorage, StorageFuture};

/// Connect to SurrealDB, initialize the schema and return a job repository.
pub async fn open(config: &DbConfig) -> Result<repositories::JobRepository, DbError> {
    let db = connect(config).await?;
    init_schema(&db).await?;
    Ok(repositories::JobRepository::new(db))
}
