//! In-memory scan queue for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{compute_retry_backoff_seconds, AckOutcome, NackOutcome, ScanTaskQueue};
use crate::{StoreError, StoreResult};
use scanvault_core::models::{ScanTask, TaskState};

#[derive(Default)]
struct QueueState {
    tasks: HashMap<Uuid, ScanTask>,
    /// file_id -> open task id, enforcing the one-open-task-per-file invariant.
    open_by_file: HashMap<Uuid, Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryScanQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryScanQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanTaskQueue for MemoryScanQueue {
    async fn enqueue(&self, file_id: Uuid, max_attempts: i32) -> StoreResult<ScanTask> {
        let mut state = self.state.lock().await;
        if state.open_by_file.contains_key(&file_id) {
            return Err(StoreError::DuplicateOpenTask(file_id));
        }

        let now = Utc::now();
        let task = ScanTask {
            id: Uuid::new_v4(),
            file_id,
            state: TaskState::Queued,
            attempt_count: 0,
            max_attempts,
            enqueued_at: now,
            not_before: now,
            lease_expires_at: None,
            last_error: None,
        };

        state.open_by_file.insert(file_id, task.id);
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn claim(&self, lease: Duration) -> StoreResult<Option<ScanTask>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let candidate = state
            .tasks
            .values()
            .filter(|t| t.state == TaskState::Queued && t.not_before <= now)
            .min_by_key(|t| t.enqueued_at)
            .map(|t| t.id);

        let Some(task_id) = candidate else {
            return Ok(None);
        };

        let lease_secs = ChronoDuration::from_std(lease)
            .map_err(|e| StoreError::Other(anyhow::anyhow!("Invalid lease duration: {}", e)))?;

        let task = state
            .tasks
            .get_mut(&task_id)
            .expect("candidate id was just read from the map");
        task.state = TaskState::Claimed;
        task.lease_expires_at = Some(now + lease_secs);
        Ok(Some(task.clone()))
    }

    async fn ack(&self, task_id: Uuid) -> StoreResult<AckOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(AckOutcome::NotFound);
        };

        match task.state {
            TaskState::Done | TaskState::Dead => Ok(AckOutcome::AlreadyFinished),
            // The reaper took the task back; the acker no longer holds it.
            TaskState::Queued => Ok(AckOutcome::Reclaimed),
            TaskState::Claimed => {
                task.state = TaskState::Done;
                task.lease_expires_at = None;
                let file_id = task.file_id;
                state.open_by_file.remove(&file_id);
                Ok(AckOutcome::Acked)
            }
        }
    }

    async fn nack(&self, task_id: Uuid, reason: &str) -> StoreResult<NackOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(NackOutcome::NotFound);
        };

        match task.state {
            TaskState::Done | TaskState::Dead => Ok(NackOutcome::AlreadyFinished),
            TaskState::Queued => Ok(NackOutcome::Reclaimed),
            TaskState::Claimed => {
                task.last_error = Some(reason.to_string());
                task.lease_expires_at = None;

                if !task.can_retry() {
                    task.state = TaskState::Dead;
                    let file_id = task.file_id;
                    state.open_by_file.remove(&file_id);
                    return Ok(NackOutcome::Dead);
                }

                task.attempt_count += 1;
                let backoff = compute_retry_backoff_seconds(task.attempt_count);
                task.not_before = Utc::now() + ChronoDuration::seconds(backoff as i64);
                task.state = TaskState::Queued;
                Ok(NackOutcome::Retried {
                    not_before: task.not_before,
                })
            }
        }
    }

    async fn reclaim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<ScanTask>> {
        let mut state = self.state.lock().await;
        let mut reclaimed = Vec::new();

        // Reclaimed tasks must be claimable immediately, even when the caller's
        // cutoff lies ahead of the wall clock.
        let not_before = now.min(Utc::now());

        for task in state.tasks.values_mut() {
            if task.state == TaskState::Claimed
                && task.lease_expires_at.map(|t| t <= now).unwrap_or(false)
            {
                task.state = TaskState::Queued;
                task.lease_expires_at = None;
                task.not_before = not_before;
                reclaimed.push(task.clone());
            }
        }

        Ok(reclaimed)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn enqueue_claim_ack() {
        let queue = MemoryScanQueue::new();
        let file_id = Uuid::new_v4();

        let task = queue.enqueue(file_id, 3).await.unwrap();
        assert_eq!(task.state, TaskState::Queued);

        let claimed = queue.claim(LEASE).await.unwrap().unwrap();
        assert_eq!(claimed.id, task.id);
        assert_eq!(claimed.state, TaskState::Claimed);
        assert!(claimed.lease_expires_at.is_some());

        // Claimed tasks are invisible to other claimants.
        assert!(queue.claim(LEASE).await.unwrap().is_none());

        assert_eq!(queue.ack(task.id).await.unwrap(), AckOutcome::Acked);
    }

    #[tokio::test]
    async fn one_open_task_per_file() {
        let queue = MemoryScanQueue::new();
        let file_id = Uuid::new_v4();

        let task = queue.enqueue(file_id, 3).await.unwrap();
        let err = queue.enqueue(file_id, 3).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOpenTask(f) if f == file_id));

        // Once the task completes, a new one may be enqueued.
        queue.ack(task.id).await.unwrap();
        assert!(queue.enqueue(file_id, 3).await.is_ok());
    }

    #[tokio::test]
    async fn ack_is_idempotent_and_nack_after_ack_is_noop() {
        let queue = MemoryScanQueue::new();
        let task = queue.enqueue(Uuid::new_v4(), 3).await.unwrap();
        queue.claim(LEASE).await.unwrap().unwrap();

        assert_eq!(queue.ack(task.id).await.unwrap(), AckOutcome::Acked);
        assert_eq!(
            queue.ack(task.id).await.unwrap(),
            AckOutcome::AlreadyFinished
        );
        assert_eq!(
            queue.nack(task.id, "late failure").await.unwrap(),
            NackOutcome::AlreadyFinished
        );
    }

    #[tokio::test]
    async fn nack_requeues_with_backoff_then_dead_letters() {
        let queue = MemoryScanQueue::new();
        let task = queue.enqueue(Uuid::new_v4(), 2).await.unwrap();

        queue.claim(LEASE).await.unwrap().unwrap();
        let outcome = queue.nack(task.id, "engine unreachable").await.unwrap();
        let NackOutcome::Retried { not_before } = outcome else {
            panic!("expected retry, got {:?}", outcome);
        };
        assert!(not_before > Utc::now());

        // Backoff delays the next claim.
        assert!(queue.claim(LEASE).await.unwrap().is_none());

        // Force the task claimable and burn the remaining attempts.
        {
            let mut state = queue.state.lock().await;
            state.tasks.get_mut(&task.id).unwrap().not_before = Utc::now();
        }
        queue.claim(LEASE).await.unwrap().unwrap();
        let outcome = queue.nack(task.id, "engine unreachable").await.unwrap();
        assert!(matches!(outcome, NackOutcome::Retried { .. }));

        {
            let mut state = queue.state.lock().await;
            state.tasks.get_mut(&task.id).unwrap().not_before = Utc::now();
        }
        queue.claim(LEASE).await.unwrap().unwrap();
        assert_eq!(
            queue.nack(task.id, "engine unreachable").await.unwrap(),
            NackOutcome::Dead
        );
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let queue = MemoryScanQueue::new();
        let file_id = Uuid::new_v4();
        let task = queue.enqueue(file_id, 3).await.unwrap();

        queue.claim(Duration::from_secs(1)).await.unwrap().unwrap();

        // Lease not yet expired: nothing reclaimed.
        let reclaimed = queue.reclaim_expired(Utc::now()).await.unwrap();
        assert!(reclaimed.is_empty());

        let later = Utc::now() + ChronoDuration::seconds(2);
        let reclaimed = queue.reclaim_expired(later).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].file_id, file_id);

        // The reclaimed task is claimable again.
        let reclaimed_task = queue.claim(LEASE).await.unwrap().unwrap();
        assert_eq!(reclaimed_task.id, task.id);
    }

    #[tokio::test]
    async fn stale_ack_after_reclaim_leaves_task_queued() {
        let queue = MemoryScanQueue::new();
        let task = queue.enqueue(Uuid::new_v4(), 3).await.unwrap();

        queue.claim(Duration::from_secs(1)).await.unwrap().unwrap();
        let later = Utc::now() + ChronoDuration::seconds(2);
        assert_eq!(queue.reclaim_expired(later).await.unwrap().len(), 1);

        // The original claimant finishes late; its ack and nack must not
        // touch the requeued task.
        assert_eq!(queue.ack(task.id).await.unwrap(), AckOutcome::Reclaimed);
        assert_eq!(
            queue.nack(task.id, "late failure").await.unwrap(),
            NackOutcome::Reclaimed
        );

        let requeued = queue.claim(LEASE).await.unwrap().unwrap();
        assert_eq!(requeued.id, task.id);
        assert_eq!(requeued.attempt_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claimants_yield_one_winner() {
        let queue = MemoryScanQueue::new();
        queue.enqueue(Uuid::new_v4(), 3).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { queue.claim(LEASE).await }));
        }

        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                won += 1;
            }
        }
        assert_eq!(won, 1);
    }
}
