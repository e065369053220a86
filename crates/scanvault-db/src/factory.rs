//! Builds the record store and scan queue from configuration.

use std::sync::Arc;

use crate::queue::{MemoryScanQueue, PostgresScanQueue, ScanTaskQueue};
use crate::records::{MemoryFileRecordStore, PostgresFileRecordStore, FileRecordStore};
use scanvault_core::{Config, RecordStoreBackend};

/// Create the record store and scan queue pair for the configured backend.
///
/// Both always come from the same backend; mixing a durable store with an
/// in-memory queue (or vice versa) would break recovery after restart.
pub async fn create_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn FileRecordStore>, Arc<dyn ScanTaskQueue>)> {
    match config.record_store_backend {
        RecordStoreBackend::Memory => {
            tracing::warn!("Using in-memory stores; records will not survive a restart");
            Ok((
                Arc::new(MemoryFileRecordStore::new()),
                Arc::new(MemoryScanQueue::new()),
            ))
        }
        RecordStoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres backend"))?;
            let pool =
                crate::connect_and_migrate(database_url, config.db_max_connections).await?;
            Ok((
                Arc::new(PostgresFileRecordStore::new(pool.clone())),
                Arc::new(PostgresScanQueue::new(pool)),
            ))
        }
    }
}
