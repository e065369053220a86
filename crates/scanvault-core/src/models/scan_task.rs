use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Queue state of a scan task.
///
/// `Queued` tasks are claimable once `not_before` has passed. `Claimed` tasks are
/// invisible to other claimants until their lease expires. `Done` and `Dead` are
/// terminal; `Dead` marks a task that exhausted its retry budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "scan_task_state", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Claimed,
    Done,
    Dead,
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskState::Queued => write!(f, "queued"),
            TaskState::Claimed => write!(f, "claimed"),
            TaskState::Done => write!(f, "done"),
            TaskState::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for TaskState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskState::Queued),
            "claimed" => Ok(TaskState::Claimed),
            "done" => Ok(TaskState::Done),
            "dead" => Ok(TaskState::Dead),
            _ => Err(anyhow::anyhow!("Invalid task state: {}", s)),
        }
    }
}

/// One queued unit of scan work. At most one open (queued or claimed) task
/// exists per file at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTask {
    pub id: Uuid,
    pub file_id: Uuid,
    pub state: TaskState,
    /// Number of times the task has been returned for retry.
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest instant the task may be claimed (retry backoff).
    pub not_before: DateTime<Utc>,
    /// While claimed, the instant after which the task becomes reclaimable.
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScanTask {
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}
