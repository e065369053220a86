//! Storage abstraction trait
//!
//! All storage backends (local filesystem, S3, Azure) implement `ObjectStorage`.
//! The pipeline works against this trait and never touches provider SDKs.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors.
///
/// `NotFound` and `InvalidKey` are permanent and must not be retried; `Backend`
/// covers transient provider failures (network, throttling) and is retryable.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether a retry of the failed operation could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Backend(_) | StorageError::Io(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked byte stream returned by `get_stream`.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Operations are idempotent on retry except `put`/`put_stream`, whose callers
/// must supply a fresh key per logical upload (see the `keys` module). Both
/// transfer directions stream rather than buffering whole files, since files may
/// approach the configured maximum size.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store a small buffer under the given key.
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Store the reader's content under the given key, returning bytes written.
    /// The reader may borrow from the caller (e.g. a request body stream).
    async fn put_stream<'a>(
        &self,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin + 'a>>,
    ) -> StorageResult<u64>;

    /// Fetch a whole object into memory. Prefer `get_stream` for file downloads.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Fetch an object as a stream of chunks.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Cheap reachability check for health reporting.
    async fn probe(&self) -> StorageResult<()>;
}
