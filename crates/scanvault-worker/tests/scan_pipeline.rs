//! End-to-end scan pipeline tests over in-memory stores and a stub engine.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use object_store::memory::InMemory;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use scanvault_core::models::{NewFileRecord, ScanStatus};
use scanvault_db::{
    CasOutcome, FileRecordStore, MemoryFileRecordStore, MemoryScanQueue, ScanTaskQueue,
};
use scanvault_services::{ScanVerdict, VirusScanner};
use scanvault_storage::{ObjectStorage, ObjectStoreStorage};
use scanvault_worker::ScanContext;

const LEASE: Duration = Duration::from_secs(600);

/// Scanner returning a fixed verdict.
struct StaticScanner(ScanVerdict);

#[async_trait]
impl VirusScanner for StaticScanner {
    async fn scan(&self, _data: &[u8]) -> ScanVerdict {
        self.0.clone()
    }

    async fn engine_version(&self) -> Option<String> {
        Some("StubAV 1.0".to_string())
    }

    async fn probe(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Scanner that blocks until released, for lease-expiry timing tests.
struct GatedScanner {
    gate: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl VirusScanner for GatedScanner {
    async fn scan(&self, _data: &[u8]) -> ScanVerdict {
        self.gate.notified().await;
        ScanVerdict::Clean
    }

    async fn engine_version(&self) -> Option<String> {
        None
    }

    async fn probe(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Scanner that counts how often it runs.
struct CountingScanner {
    calls: AtomicUsize,
    verdict: ScanVerdict,
}

#[async_trait]
impl VirusScanner for CountingScanner {
    async fn scan(&self, _data: &[u8]) -> ScanVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }

    async fn engine_version(&self) -> Option<String> {
        None
    }

    async fn probe(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Fixture {
    records: Arc<MemoryFileRecordStore>,
    queue: Arc<MemoryScanQueue>,
    storage: Arc<ObjectStoreStorage>,
    ctx: ScanContext,
}

fn fixture(scanner: Arc<dyn VirusScanner>, purge_infected: bool) -> Fixture {
    let records = Arc::new(MemoryFileRecordStore::new());
    let queue = Arc::new(MemoryScanQueue::new());
    let storage = Arc::new(ObjectStoreStorage::new(Arc::new(InMemory::new()), "memory"));
    let ctx = ScanContext {
        records: records.clone(),
        queue: queue.clone(),
        storage: storage.clone(),
        scanner,
        purge_infected,
    };
    Fixture {
        records,
        queue,
        storage,
        ctx,
    }
}

/// Create a record with its object in storage; returns the file id.
async fn seed_file(fx: &Fixture, content: &[u8]) -> Uuid {
    let id = Uuid::new_v4();
    let key = format!("uploads/{}.txt", id);
    fx.storage.put(&key, content.to_vec()).await.unwrap();
    fx.records
        .create(NewFileRecord {
            id,
            filename: "sample.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: content.len() as i64,
            storage_key: key,
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn clean_file_reaches_clean_with_report() {
    let fx = fixture(Arc::new(StaticScanner(ScanVerdict::Clean)), false);
    let file_id = seed_file(&fx, b"wholesome bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();
    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Clean);
    let report = record.scan_report.unwrap();
    assert_eq!(report.engine_version.as_deref(), Some("StubAV 1.0"));
    assert!(report.threat_name.is_none());

    // Task acked: nothing left to claim.
    assert!(fx.queue.claim(LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn infected_file_flagged_and_object_kept_by_default() {
    let fx = fixture(
        Arc::new(StaticScanner(ScanVerdict::Infected {
            threat_name: "Eicar-Signature".to_string(),
        })),
        false,
    );
    let file_id = seed_file(&fx, b"suspicious bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();
    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Infected);
    assert_eq!(
        record.scan_report.unwrap().threat_name.as_deref(),
        Some("Eicar-Signature")
    );
    assert!(fx.storage.exists(&record.storage_key).await.unwrap());
}

#[tokio::test]
async fn infected_object_purged_when_enabled() {
    let fx = fixture(
        Arc::new(StaticScanner(ScanVerdict::Infected {
            threat_name: "Eicar-Signature".to_string(),
        })),
        true,
    );
    let file_id = seed_file(&fx, b"suspicious bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();
    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Infected);
    assert!(!fx.storage.exists(&record.storage_key).await.unwrap());
}

#[tokio::test]
async fn engine_error_rewinds_to_pending_for_retry() {
    let fx = fixture(
        Arc::new(StaticScanner(ScanVerdict::Error {
            message: "engine unreachable".to_string(),
        })),
        false,
    );
    let file_id = seed_file(&fx, b"bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();
    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    // Record rewound so the retry can win the claim CAS again.
    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Pending);

    // Requeued under backoff: not claimable immediately.
    assert!(fx.queue.claim(LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn exhausted_retries_mark_file_errored() {
    let fx = fixture(
        Arc::new(StaticScanner(ScanVerdict::Error {
            message: "engine unreachable".to_string(),
        })),
        false,
    );
    let file_id = seed_file(&fx, b"bytes").await;

    // Zero retries: the first failure dead-letters the task.
    fx.queue.enqueue(file_id, 0).await.unwrap();
    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Error);
    assert_eq!(
        record.scan_report.unwrap().error_message.as_deref(),
        Some("engine unreachable")
    );
}

#[tokio::test]
async fn lost_claim_race_discards_task() {
    let scanner = Arc::new(CountingScanner {
        calls: AtomicUsize::new(0),
        verdict: ScanVerdict::Clean,
    });
    let fx = fixture(scanner.clone(), false);
    let file_id = seed_file(&fx, b"bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();

    // Another worker already advanced the record.
    let outcome = fx
        .records
        .compare_and_set_status(file_id, ScanStatus::Pending, ScanStatus::Scanning, None)
        .await
        .unwrap();
    assert_eq!(outcome, CasOutcome::Updated);

    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    // The loser never scanned; the task is gone; the record is untouched.
    assert_eq!(scanner.calls.load(Ordering::SeqCst), 0);
    assert!(fx.queue.claim(LEASE).await.unwrap().is_none());
    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Scanning);
}

#[tokio::test]
async fn missing_object_marks_file_errored() {
    let fx = fixture(Arc::new(StaticScanner(ScanVerdict::Clean)), false);

    let file_id = Uuid::new_v4();
    fx.records
        .create(NewFileRecord {
            id: file_id,
            filename: "ghost.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 4,
            storage_key: format!("uploads/{}.txt", file_id),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
        .await
        .unwrap();

    fx.queue.enqueue(file_id, 3).await.unwrap();
    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Error);
    assert_eq!(
        record.scan_report.unwrap().error_message.as_deref(),
        Some("Stored object missing")
    );
    assert!(fx.queue.claim(LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn deleted_record_discards_task() {
    let fx = fixture(Arc::new(StaticScanner(ScanVerdict::Clean)), false);
    let file_id = seed_file(&fx, b"bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();
    fx.records.delete(file_id).await.unwrap();

    let task = fx.queue.claim(LEASE).await.unwrap().unwrap();
    fx.ctx.process(&task).await.unwrap();

    assert!(fx.queue.claim(LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn lease_reaper_recovers_abandoned_scan() {
    let fx = fixture(Arc::new(StaticScanner(ScanVerdict::Clean)), false);
    let file_id = seed_file(&fx, b"bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();

    // Simulate a worker that claimed, advanced the record, then crashed.
    let task = fx
        .queue
        .claim(Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    fx.records
        .compare_and_set_status(file_id, ScanStatus::Pending, ScanStatus::Scanning, None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let reclaimed = fx.ctx.reclaim_expired_leases().await.unwrap();
    assert_eq!(reclaimed, 1);

    // Record rewound and task claimable again: a healthy worker can finish it.
    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Pending);

    let retried = fx.queue.claim(LEASE).await.unwrap().unwrap();
    assert_eq!(retried.id, task.id);
    fx.ctx.process(&retried).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Clean);
}

#[tokio::test]
async fn overrunning_worker_cannot_wedge_file() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let fx = fixture(Arc::new(GatedScanner { gate: gate.clone() }), false);
    let file_id = seed_file(&fx, b"bytes").await;

    fx.queue.enqueue(file_id, 3).await.unwrap();

    // A slow worker claims under a short lease and stalls mid-scan.
    let task = fx
        .queue
        .claim(Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();

    let ctx = Arc::new(ScanContext {
        records: fx.records.clone(),
        queue: fx.queue.clone(),
        storage: fx.storage.clone(),
        scanner: Arc::new(GatedScanner { gate: gate.clone() }),
        purge_infected: false,
    });
    let slow_worker = tokio::spawn({
        let ctx = ctx.clone();
        let task = task.clone();
        async move { ctx.process(&task).await }
    });

    // Wait for the slow worker to win the claim and enter scanning.
    loop {
        let record = fx.records.get(file_id).await.unwrap().unwrap();
        if record.scan_status == ScanStatus::Scanning {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fx.ctx.reclaim_expired_leases().await.unwrap(), 1);

    // The slow worker wakes up after the reclaim; its stale verdict and ack
    // must leave the requeued task and the pending record untouched.
    gate.notify_one();
    slow_worker.await.unwrap().unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Pending);

    // A healthy worker can still claim the task and finish the scan.
    let retried = fx.queue.claim(LEASE).await.unwrap().unwrap();
    assert_eq!(retried.id, task.id);
    gate.notify_one();
    fx.ctx.process(&retried).await.unwrap();

    let record = fx.records.get(file_id).await.unwrap().unwrap();
    assert_eq!(record.scan_status, ScanStatus::Clean);
}

#[tokio::test]
async fn retention_sweep_deletes_expired_files() {
    let fx = fixture(Arc::new(StaticScanner(ScanVerdict::Clean)), false);

    let expired_id = Uuid::new_v4();
    let expired_key = format!("uploads/{}.txt", expired_id);
    fx.storage.put(&expired_key, b"old".to_vec()).await.unwrap();
    fx.records
        .create(NewFileRecord {
            id: expired_id,
            filename: "old.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 3,
            storage_key: expired_key.clone(),
            expires_at: Utc::now() - ChronoDuration::hours(1),
        })
        .await
        .unwrap();

    let live_id = seed_file(&fx, b"fresh").await;

    let purged = fx.ctx.purge_expired_files(100).await.unwrap();
    assert_eq!(purged, 1);

    assert!(fx.records.get(expired_id).await.unwrap().is_none());
    assert!(!fx.storage.exists(&expired_key).await.unwrap());
    assert!(fx.records.get(live_id).await.unwrap().is_some());
}
