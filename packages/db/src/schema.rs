//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates the job table, its fields and indexes.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_id ON job TYPE string;
DEFINE FIELD IF NOT EXISTS name ON job TYPE string;
DEFINE FIELD IF NOT EXISTS arguments ON job TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS status ON job TYPE string DEFAULT "queued";
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE string;

DEFINE INDEX IF NOT EXISTS job_status ON job FIELDS status;
"#;
