//! Scan task queue: decouples file intake from scanning.
//!
//! Claimed tasks are invisible to other claimants until their lease expires;
//! delivery is at-least-once, so workers must stay idempotent with respect to
//! re-scanning. Failed tasks are retried with capped exponential backoff up to
//! a bounded attempt limit, then dead-lettered.

mod memory;
mod postgres;

pub use memory::MemoryScanQueue;
pub use postgres::PostgresScanQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::StoreResult;
use scanvault_core::models::ScanTask;

/// Maximum delay in seconds before retrying a failed task. Caps exponential
/// backoff so that high attempt counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given attempt count (exponential with cap).
#[inline]
pub fn compute_retry_backoff_seconds(attempt_count: i32) -> u64 {
    (2_u64.pow(attempt_count.max(0) as u32)).min(MAX_RETRY_BACKOFF_SECS)
}

/// Result of acknowledging a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    /// The lease lapsed and the reaper returned the task to the queue before
    /// the ack arrived. The task stays claimable; the call was a no-op.
    Reclaimed,
    /// The task was already in a terminal state; the call was a no-op.
    AlreadyFinished,
    NotFound,
}

/// Result of returning a task for retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackOutcome {
    /// Requeued; claimable again once `not_before` passes.
    Retried { not_before: DateTime<Utc> },
    /// The lease lapsed and the reaper already requeued the task. The retry is
    /// in place; the call was a no-op.
    Reclaimed,
    /// Retry budget exhausted; the task was dead-lettered and the caller must
    /// force the file record to `error`.
    Dead,
    /// The task was already in a terminal state; the call was a no-op.
    AlreadyFinished,
    NotFound,
}

#[async_trait]
pub trait ScanTaskQueue: Send + Sync {
    /// Queue a scan for the file. Fails with `DuplicateOpenTask` when an open
    /// task for the same file already exists.
    async fn enqueue(&self, file_id: Uuid, max_attempts: i32) -> StoreResult<ScanTask>;

    /// Claim the next available task, holding it under a lease. Returns `None`
    /// when nothing is claimable.
    async fn claim(&self, lease: Duration) -> StoreResult<Option<ScanTask>>;

    /// Mark a claimed task complete. Idempotent. A task the reaper already
    /// returned to the queue is left queued and reported as `Reclaimed`, so a
    /// worker that overran its lease can never finalize a task it no longer
    /// holds.
    async fn ack(&self, task_id: Uuid) -> StoreResult<AckOutcome>;

    /// Return a claimed task for retry, recording the failure reason. A task
    /// the reaper already returned to the queue is left as is.
    async fn nack(&self, task_id: Uuid, reason: &str) -> StoreResult<NackOutcome>;

    /// Return expired-lease tasks to the queue, yielding the reclaimed tasks so
    /// the caller can rewind their file records out of `scanning`.
    async fn reclaim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<ScanTask>>;

    /// Reachability check for health reporting.
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(10), MAX_RETRY_BACKOFF_SECS);
    }
}
