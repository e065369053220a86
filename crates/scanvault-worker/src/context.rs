//! Scan task processing.
//!
//! The record's `scan_status` is the single source of truth for claim ties:
//! a worker only scans after winning the `pending -> scanning` compare-and-set,
//! and a lost CAS means another worker (or a stale retry) already owns the
//! file, so the task is acknowledged and discarded. Queue delivery is
//! at-least-once; this protocol makes duplicate deliveries harmless.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use scanvault_core::models::{ScanReport, ScanStatus, ScanTask};
use scanvault_db::{AckOutcome, CasOutcome, FileRecordStore, NackOutcome, ScanTaskQueue};
use scanvault_services::{ScanVerdict, VirusScanner};
use scanvault_storage::{ObjectStorage, StorageError};

/// Everything a worker needs to process one scan task.
pub struct ScanContext {
    pub records: Arc<dyn FileRecordStore>,
    pub queue: Arc<dyn ScanTaskQueue>,
    pub storage: Arc<dyn ObjectStorage>,
    pub scanner: Arc<dyn VirusScanner>,
    /// Delete infected objects from storage once the verdict lands.
    pub purge_infected: bool,
}

impl ScanContext {
    /// Process one claimed task through to ack or nack.
    #[tracing::instrument(skip(self, task), fields(task_id = %task.id, file_id = %task.file_id))]
    pub async fn process(&self, task: &ScanTask) -> Result<()> {
        let Some(record) = self.records.get(task.file_id).await? else {
            tracing::warn!("File record missing; discarding scan task");
            self.queue.ack(task.id).await?;
            return Ok(());
        };

        match self
            .records
            .compare_and_set_status(task.file_id, ScanStatus::Pending, ScanStatus::Scanning, None)
            .await?
        {
            CasOutcome::Updated => {}
            CasOutcome::Conflict => {
                tracing::debug!(
                    status = %record.scan_status,
                    "File not pending; another worker owns it or the scan already resolved"
                );
                self.queue.ack(task.id).await?;
                return Ok(());
            }
            CasOutcome::NotFound => {
                self.queue.ack(task.id).await?;
                return Ok(());
            }
        }

        let start = Instant::now();
        let data = match self.storage.get(&record.storage_key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => {
                // The object is gone for good; retrying cannot succeed.
                let report = ScanReport {
                    engine_version: None,
                    threat_name: None,
                    scan_duration_ms: 0,
                    scanned_at: Utc::now(),
                    error_message: Some("Stored object missing".to_string()),
                };
                tracing::error!(storage_key = %record.storage_key, "Stored object missing");
                self.resolve(task, ScanStatus::Error, report).await?;
                return Ok(());
            }
            Err(e) => {
                self.rewind_to_pending(task.file_id).await?;
                self.retry_or_dead(task, &format!("Storage read failed: {}", e))
                    .await?;
                return Ok(());
            }
        };

        let verdict = self.scanner.scan(&data).await;
        let duration_ms = start.elapsed().as_millis() as i64;

        match verdict {
            ScanVerdict::Clean => {
                let report = ScanReport {
                    engine_version: self.scanner.engine_version().await,
                    threat_name: None,
                    scan_duration_ms: duration_ms,
                    scanned_at: Utc::now(),
                    error_message: None,
                };
                tracing::info!(duration_ms, "File is clean");
                self.resolve(task, ScanStatus::Clean, report).await
            }
            ScanVerdict::Infected { threat_name } => {
                let report = ScanReport {
                    engine_version: self.scanner.engine_version().await,
                    threat_name: Some(threat_name.clone()),
                    scan_duration_ms: duration_ms,
                    scanned_at: Utc::now(),
                    error_message: None,
                };
                tracing::warn!(threat = %threat_name, duration_ms, "File is infected");
                self.resolve(task, ScanStatus::Infected, report).await?;

                if self.purge_infected {
                    if let Err(e) = self.storage.delete(&record.storage_key).await {
                        tracing::error!(
                            error = %e,
                            storage_key = %record.storage_key,
                            "Failed to purge infected object"
                        );
                    } else {
                        tracing::info!(storage_key = %record.storage_key, "Infected object purged");
                    }
                }
                Ok(())
            }
            ScanVerdict::Error { message } => {
                self.rewind_to_pending(task.file_id).await?;
                self.retry_or_dead(task, &message).await
            }
        }
    }

    /// Advance the record `scanning -> terminal` and ack the task. A lost CAS
    /// here means a concurrent actor already resolved the file; the verdict is
    /// dropped and the task still acked.
    async fn resolve(&self, task: &ScanTask, status: ScanStatus, report: ScanReport) -> Result<()> {
        let outcome = self
            .records
            .compare_and_set_status(task.file_id, ScanStatus::Scanning, status, Some(report))
            .await?;
        if outcome != CasOutcome::Updated {
            tracing::warn!(
                intended = %status,
                ?outcome,
                "Discarding scan verdict; record no longer in scanning state"
            );
        }
        match self.queue.ack(task.id).await? {
            AckOutcome::Acked => {}
            ack => {
                tracing::debug!(?ack, "Task no longer held; ack was a no-op");
            }
        }
        Ok(())
    }

    async fn rewind_to_pending(&self, file_id: Uuid) -> Result<()> {
        let outcome = self
            .records
            .compare_and_set_status(file_id, ScanStatus::Scanning, ScanStatus::Pending, None)
            .await?;
        if outcome != CasOutcome::Updated {
            tracing::warn!(file_id = %file_id, ?outcome, "Failed to rewind record to pending");
        }
        Ok(())
    }

    /// Nack the task; when the retry budget is exhausted, force the record to
    /// `error` so it cannot sit in `pending` forever.
    async fn retry_or_dead(&self, task: &ScanTask, reason: &str) -> Result<()> {
        match self.queue.nack(task.id, reason).await? {
            NackOutcome::Retried { not_before } => {
                tracing::info!(%not_before, reason, "Scan will be retried");
            }
            NackOutcome::Dead => {
                let report = ScanReport {
                    engine_version: None,
                    threat_name: None,
                    scan_duration_ms: 0,
                    scanned_at: Utc::now(),
                    error_message: Some(reason.to_string()),
                };
                let outcome = self
                    .records
                    .compare_and_set_status(
                        task.file_id,
                        ScanStatus::Pending,
                        ScanStatus::Error,
                        Some(report),
                    )
                    .await?;
                if outcome != CasOutcome::Updated {
                    tracing::warn!(?outcome, "Failed to mark dead-lettered file as errored");
                }
                tracing::error!(reason, "Scan retries exhausted; file marked errored");
            }
            NackOutcome::Reclaimed => {
                tracing::debug!("Task no longer held; nack was a no-op");
            }
            other => {
                tracing::warn!(?other, "Unexpected nack outcome");
            }
        }
        Ok(())
    }

    /// Return expired-lease tasks to the queue and rewind their records out of
    /// `scanning` so they can be claimed again. Returns how many were reclaimed.
    pub async fn reclaim_expired_leases(&self) -> Result<usize> {
        let reclaimed = self
            .queue
            .reclaim_expired(Utc::now())
            .await
            .context("Failed to reclaim expired leases")?;

        for task in &reclaimed {
            let outcome = self
                .records
                .compare_and_set_status(
                    task.file_id,
                    ScanStatus::Scanning,
                    ScanStatus::Pending,
                    None,
                )
                .await?;
            if outcome == CasOutcome::Updated {
                tracing::warn!(
                    task_id = %task.id,
                    file_id = %task.file_id,
                    "Rewound abandoned scan to pending"
                );
            }
        }

        Ok(reclaimed.len())
    }

    /// Delete expired files: storage object first, then the record. Returns how
    /// many records were removed.
    pub async fn purge_expired_files(&self, limit: i64) -> Result<usize> {
        let expired = self
            .records
            .list_expired(Utc::now(), limit)
            .await
            .context("Failed to list expired files")?;

        let mut purged = 0;
        for record in expired {
            if let Err(e) = self.storage.delete(&record.storage_key).await {
                // Keep the record so the next sweep retries the object delete.
                tracing::error!(
                    error = %e,
                    file_id = %record.id,
                    storage_key = %record.storage_key,
                    "Failed to delete expired object; will retry next sweep"
                );
                continue;
            }
            if self.records.delete(record.id).await? {
                tracing::info!(file_id = %record.id, "Expired file purged");
                purged += 1;
            }
        }

        Ok(purged)
    }
}
