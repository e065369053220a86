//! Postgres-backed scan queue.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent workers never block on
//! or double-claim the same task. The partial unique index on open tasks backs
//! the one-open-task-per-file invariant.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use uuid::Uuid;

use super::{compute_retry_backoff_seconds, AckOutcome, NackOutcome, ScanTaskQueue};
use crate::{StoreError, StoreResult};
use scanvault_core::models::{ScanTask, TaskState};

const TASK_COLUMNS: &str = r#"
    id,
    file_id,
    state,
    attempt_count,
    max_attempts,
    enqueued_at,
    not_before,
    lease_expires_at,
    last_error
"#;

#[derive(sqlx::FromRow)]
struct ScanTaskRow {
    id: Uuid,
    file_id: Uuid,
    state: TaskState,
    attempt_count: i32,
    max_attempts: i32,
    enqueued_at: DateTime<Utc>,
    not_before: DateTime<Utc>,
    lease_expires_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl From<ScanTaskRow> for ScanTask {
    fn from(row: ScanTaskRow) -> Self {
        ScanTask {
            id: row.id,
            file_id: row.file_id,
            state: row.state,
            attempt_count: row.attempt_count,
            max_attempts: row.max_attempts,
            enqueued_at: row.enqueued_at,
            not_before: row.not_before,
            lease_expires_at: row.lease_expires_at,
            last_error: row.last_error,
        }
    }
}

#[derive(Clone)]
pub struct PostgresScanQueue {
    pool: PgPool,
}

impl PostgresScanQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanTaskQueue for PostgresScanQueue {
    #[tracing::instrument(skip(self))]
    async fn enqueue(&self, file_id: Uuid, max_attempts: i32) -> StoreResult<ScanTask> {
        let query = format!(
            r#"
            INSERT INTO scan_tasks (id, file_id, max_attempts)
            VALUES ($1, $2, $3)
            RETURNING {TASK_COLUMNS}
            "#
        );

        let row: ScanTaskRow = sqlx::query_as::<Postgres, ScanTaskRow>(&query)
            .bind(Uuid::new_v4())
            .bind(file_id)
            .bind(max_attempts)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false)
                {
                    StoreError::DuplicateOpenTask(file_id)
                } else {
                    StoreError::Other(anyhow::anyhow!("Failed to enqueue scan task: {}", e))
                }
            })?;

        tracing::info!(task_id = %row.id, file_id = %file_id, "Scan task enqueued");
        Ok(row.into())
    }

    async fn claim(&self, lease: Duration) -> StoreResult<Option<ScanTask>> {
        let lease_secs = ChronoDuration::from_std(lease)
            .map_err(|e| StoreError::Other(anyhow::anyhow!("Invalid lease duration: {}", e)))?;
        let now = Utc::now();

        let query = format!(
            r#"
            UPDATE scan_tasks
            SET state = 'claimed',
                lease_expires_at = $2
            WHERE id = (
                SELECT id FROM scan_tasks
                WHERE state = 'queued' AND not_before <= $1
                ORDER BY enqueued_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {TASK_COLUMNS}
            "#
        );

        let row: Option<ScanTaskRow> = sqlx::query_as::<Postgres, ScanTaskRow>(&query)
            .bind(now)
            .bind(now + lease_secs)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim scan task")?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self))]
    async fn ack(&self, task_id: Uuid) -> StoreResult<AckOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE scan_tasks
            SET state = 'done',
                lease_expires_at = NULL
            WHERE id = $1 AND state = 'claimed'
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .context("Failed to ack scan task")?;

        if result.rows_affected() > 0 {
            return Ok(AckOutcome::Acked);
        }

        let state: Option<(TaskState,)> =
            sqlx::query_as("SELECT state FROM scan_tasks WHERE id = $1")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check scan task state")?;

        match state {
            // The reaper took the task back; the acker no longer holds it.
            Some((TaskState::Queued,)) => Ok(AckOutcome::Reclaimed),
            Some(_) => Ok(AckOutcome::AlreadyFinished),
            None => Ok(AckOutcome::NotFound),
        }
    }

    #[tracing::instrument(skip(self, reason))]
    async fn nack(&self, task_id: Uuid, reason: &str) -> StoreResult<NackOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin nack transaction")?;

        let query = format!("SELECT {TASK_COLUMNS} FROM scan_tasks WHERE id = $1 FOR UPDATE");
        let row: Option<ScanTaskRow> = sqlx::query_as::<Postgres, ScanTaskRow>(&query)
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock scan task for nack")?;

        let Some(task) = row else {
            return Ok(NackOutcome::NotFound);
        };

        match task.state {
            TaskState::Done | TaskState::Dead => Ok(NackOutcome::AlreadyFinished),
            TaskState::Queued => Ok(NackOutcome::Reclaimed),
            TaskState::Claimed if task.attempt_count >= task.max_attempts => {
                sqlx::query(
                    r#"
                    UPDATE scan_tasks
                    SET state = 'dead',
                        lease_expires_at = NULL,
                        last_error = $2
                    WHERE id = $1
                    "#,
                )
                .bind(task_id)
                .bind(reason)
                .execute(&mut *tx)
                .await
                .context("Failed to dead-letter scan task")?;
                tx.commit().await.context("Failed to commit nack")?;

                tracing::warn!(task_id = %task_id, file_id = %task.file_id, "Scan task dead-lettered");
                Ok(NackOutcome::Dead)
            }
            TaskState::Claimed => {
                let attempt_count = task.attempt_count + 1;
                let backoff = compute_retry_backoff_seconds(attempt_count);
                let not_before = Utc::now() + ChronoDuration::seconds(backoff as i64);

                sqlx::query(
                    r#"
                    UPDATE scan_tasks
                    SET state = 'queued',
                        attempt_count = $2,
                        not_before = $3,
                        lease_expires_at = NULL,
                        last_error = $4
                    WHERE id = $1
                    "#,
                )
                .bind(task_id)
                .bind(attempt_count)
                .bind(not_before)
                .bind(reason)
                .execute(&mut *tx)
                .await
                .context("Failed to requeue scan task")?;
                tx.commit().await.context("Failed to commit nack")?;

                tracing::info!(
                    task_id = %task_id,
                    attempt_count,
                    backoff_secs = backoff,
                    "Scan task requeued for retry"
                );
                Ok(NackOutcome::Retried { not_before })
            }
        }
    }

    async fn reclaim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<ScanTask>> {
        let query = format!(
            r#"
            UPDATE scan_tasks
            SET state = 'queued',
                lease_expires_at = NULL,
                not_before = LEAST($1, NOW())
            WHERE state = 'claimed' AND lease_expires_at <= $1
            RETURNING {TASK_COLUMNS}
            "#
        );

        let rows: Vec<ScanTaskRow> = sqlx::query_as::<Postgres, ScanTaskRow>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .context("Failed to reclaim expired scan tasks")?;

        if !rows.is_empty() {
            tracing::warn!(count = rows.len(), "Reclaimed scan tasks with expired leases");
        }

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Scan queue unreachable")?;
        Ok(())
    }
}
