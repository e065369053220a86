//! In-memory record store for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CasOutcome, FileRecordStore};
use crate::{StoreError, StoreResult};
use scanvault_core::models::{FileRecord, NewFileRecord, ScanReport, ScanStatus};

#[derive(Clone, Default)]
pub struct MemoryFileRecordStore {
    records: Arc<RwLock<HashMap<Uuid, FileRecord>>>,
}

impl MemoryFileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileRecordStore for MemoryFileRecordStore {
    async fn create(&self, new: NewFileRecord) -> StoreResult<FileRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&new.id) {
            return Err(StoreError::DuplicateId(new.id));
        }

        let record = FileRecord {
            id: new.id,
            filename: new.filename,
            content_type: new.content_type,
            size_bytes: new.size_bytes,
            storage_key: new.storage_key,
            scan_status: ScanStatus::Pending,
            scan_report: None,
            upload_timestamp: Utc::now(),
            download_count: 0,
            last_downloaded_at: None,
            expires_at: new.expires_at,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, file_id: Uuid) -> StoreResult<Option<FileRecord>> {
        Ok(self.records.read().await.get(&file_id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        file_id: Uuid,
        expected: ScanStatus,
        new: ScanStatus,
        report: Option<ScanReport>,
    ) -> StoreResult<CasOutcome> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&file_id) else {
            return Ok(CasOutcome::NotFound);
        };
        if record.scan_status != expected {
            return Ok(CasOutcome::Conflict);
        }
        record.scan_status = new;
        if report.is_some() {
            record.scan_report = report;
        }
        Ok(CasOutcome::Updated)
    }

    async fn record_download(&self, file_id: Uuid) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&file_id) {
            record.download_count += 1;
            record.last_downloaded_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<FileRecord>> {
        let records = self.records.read().await;
        let mut expired: Vec<FileRecord> = records
            .values()
            .filter(|r| r.expires_at <= now)
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        expired.truncate(limit.max(0) as usize);
        Ok(expired)
    }

    async fn list(&self, skip: u64, limit: u64) -> StoreResult<(Vec<FileRecord>, u64)> {
        let records = self.records.read().await;
        let total = records.len() as u64;
        let mut all: Vec<FileRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        let page = all
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn delete(&self, file_id: Uuid) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(&file_id).is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_record(id: Uuid) -> NewFileRecord {
        NewFileRecord {
            id,
            filename: "test.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 9,
            storage_key: format!("uploads/{}.txt", id),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn create_starts_pending() {
        let store = MemoryFileRecordStore::new();
        let id = Uuid::new_v4();
        let record = store.create(new_record(id)).await.unwrap();
        assert_eq!(record.scan_status, ScanStatus::Pending);
        assert_eq!(record.download_count, 0);
        assert!(record.scan_report.is_none());
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let store = MemoryFileRecordStore::new();
        let id = Uuid::new_v4();
        store.create(new_record(id)).await.unwrap();
        let err = store.create(new_record(id)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(other) if other == id));
    }

    #[tokio::test]
    async fn cas_advances_only_from_expected() {
        let store = MemoryFileRecordStore::new();
        let id = Uuid::new_v4();
        store.create(new_record(id)).await.unwrap();

        let outcome = store
            .compare_and_set_status(id, ScanStatus::Pending, ScanStatus::Scanning, None)
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Updated);

        // A second worker trying the same transition loses the race.
        let outcome = store
            .compare_and_set_status(id, ScanStatus::Pending, ScanStatus::Scanning, None)
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);

        let report = ScanReport {
            engine_version: Some("ClamAV 1.2".to_string()),
            threat_name: None,
            scan_duration_ms: 12,
            scanned_at: Utc::now(),
            error_message: None,
        };
        let outcome = store
            .compare_and_set_status(id, ScanStatus::Scanning, ScanStatus::Clean, Some(report))
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Updated);

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.scan_status, ScanStatus::Clean);
        assert!(record.scan_report.is_some());
    }

    #[tokio::test]
    async fn cas_missing_record_is_not_found() {
        let store = MemoryFileRecordStore::new();
        let outcome = store
            .compare_and_set_status(
                Uuid::new_v4(),
                ScanStatus::Pending,
                ScanStatus::Scanning,
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::NotFound);
    }

    #[tokio::test]
    async fn record_download_increments() {
        let store = MemoryFileRecordStore::new();
        let id = Uuid::new_v4();
        store.create(new_record(id)).await.unwrap();

        store.record_download(id).await.unwrap();
        store.record_download(id).await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.download_count, 2);
        assert!(record.last_downloaded_at.is_some());
    }

    #[tokio::test]
    async fn list_expired_filters_and_orders() {
        let store = MemoryFileRecordStore::new();

        let expired_id = Uuid::new_v4();
        let mut expired = new_record(expired_id);
        expired.expires_at = Utc::now() - Duration::hours(1);
        store.create(expired).await.unwrap();

        let live_id = Uuid::new_v4();
        store.create(new_record(live_id)).await.unwrap();

        let found = store.list_expired(Utc::now(), 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, expired_id);
    }

    #[tokio::test]
    async fn list_paginates() {
        let store = MemoryFileRecordStore::new();
        for _ in 0..5 {
            store.create(new_record(Uuid::new_v4())).await.unwrap();
        }

        let (page, total) = store.list(0, 3).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(total, 5);

        let (page, _) = store.list(4, 3).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryFileRecordStore::new();
        let id = Uuid::new_v4();
        store.create(new_record(id)).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
    }
}
