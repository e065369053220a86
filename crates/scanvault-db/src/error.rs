use uuid::Uuid;

/// Errors surfaced by the record store and task queue.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this id already exists. Practically unreachable with
    /// generated UUIDs; surfaced anyway so a collision is never silent.
    #[error("duplicate file id: {0}")]
    DuplicateId(Uuid),

    /// An open (queued or claimed) scan task already exists for this file.
    #[error("open scan task already exists for file: {0}")]
    DuplicateOpenTask(Uuid),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
