//! File record store: durable mapping from file id to metadata and scan state.

mod memory;
mod postgres;

pub use memory::MemoryFileRecordStore;
pub use postgres::PostgresFileRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::StoreResult;
use scanvault_core::models::{FileRecord, NewFileRecord, ScanReport, ScanStatus};

/// Result of a compare-and-set attempt on a record's scan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Updated,
    /// The record's current status did not match the expected status. The
    /// caller lost the race and must discard its update.
    Conflict,
    NotFound,
}

/// Durable store of file records.
///
/// `compare_and_set_status` is the only way scan status advances; it prevents
/// two workers from both completing the same scan or a worker racing a stale
/// retry.
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    /// Create a record in `pending` state with zeroed download statistics.
    async fn create(&self, new: NewFileRecord) -> StoreResult<FileRecord>;

    async fn get(&self, file_id: Uuid) -> StoreResult<Option<FileRecord>>;

    /// Atomically advance `scan_status` from `expected` to `new`, attaching the
    /// scan report when one is supplied.
    async fn compare_and_set_status(
        &self,
        file_id: Uuid,
        expected: ScanStatus,
        new: ScanStatus,
        report: Option<ScanReport>,
    ) -> StoreResult<CasOutcome>;

    /// Increment the download counter and stamp the last download time.
    async fn record_download(&self, file_id: Uuid) -> StoreResult<()>;

    /// Records whose `expires_at` has passed, oldest first.
    async fn list_expired(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<FileRecord>>;

    /// Paginated listing, newest first, with the total record count.
    async fn list(&self, skip: u64, limit: u64) -> StoreResult<(Vec<FileRecord>, u64)>;

    /// Delete a record. Returns whether a record existed.
    async fn delete(&self, file_id: Uuid) -> StoreResult<bool>;

    /// Reachability check for health reporting.
    async fn ping(&self) -> StoreResult<()>;
}
