//! ScanVault persistence: file record store and scan task queue.
//!
//! Both stores are defined as traits with a Postgres implementation for
//! production and an in-memory implementation for development and tests. They
//! are the only components holding shared mutable state; their compare-and-set
//! and claim-and-lease primitives are the pipeline's concurrency anchors.

pub mod error;
pub mod factory;
pub mod queue;
pub mod records;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub use error::{StoreError, StoreResult};
pub use factory::create_stores;
pub use queue::{
    compute_retry_backoff_seconds, AckOutcome, MemoryScanQueue, NackOutcome, PostgresScanQueue,
    ScanTaskQueue,
};
pub use records::{
    CasOutcome, FileRecordStore, MemoryFileRecordStore, PostgresFileRecordStore,
};

/// Connect to Postgres and run pending migrations.
pub async fn connect_and_migrate(
    database_url: &str,
    max_connections: u32,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!(max_connections, "Connected to Postgres and ran migrations");

    Ok(pool)
}
