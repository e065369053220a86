//! Cloud object storage backends built on `object_store`.
//!
//! S3 and Azure Blob share one implementation; only the builder differs.
//! Credentials come from the environment (`AmazonS3Builder::from_env`,
//! `MicrosoftAzureBuilder::from_env`).

use crate::traits::{ByteStream, ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{Error as ObjectStoreError, ObjectStore, PutPayload};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// `ObjectStorage` over any `object_store`-backed provider.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    label: String,
}

fn map_store_err(key: &str, e: ObjectStoreError) -> StorageError {
    match e {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
        other => StorageError::Backend(other.to_string()),
    }
}

impl ObjectStoreStorage {
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// S3 (or S3-compatible) backend.
    ///
    /// # Arguments
    /// * `bucket` - bucket name
    /// * `region` - AWS region (or region identifier for compatible providers)
    /// * `endpoint` - optional custom endpoint for S3-compatible providers
    ///   (e.g. "http://localhost:9000" for MinIO)
    pub fn s3(
        bucket: String,
        region: String,
        endpoint: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self::new(Arc::new(store), format!("s3://{}", bucket)))
    }

    /// Azure Blob Storage backend.
    pub fn azure(container: String) -> StorageResult<Self> {
        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container.clone())
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self::new(Arc::new(store), format!("azure://{}", container)))
    }

    fn location(key: &str) -> StorageResult<Path> {
        if key.contains("..") || key.starts_with('/') || key.is_empty() {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Path::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let location = Self::location(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| map_store_err(key, e))?;

        tracing::info!(
            backend = %self.label,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage put successful"
        );

        Ok(())
    }

    async fn put_stream<'a>(
        &self,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin + 'a>>,
    ) -> StorageResult<u64> {
        let location = Self::location(key)?;
        let start = std::time::Instant::now();

        let mut writer = BufWriter::new(Arc::clone(&self.store), location);

        let bytes_copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to stream object: {}", e)))?;

        writer
            .shutdown()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to finish upload: {}", e)))?;

        tracing::info!(
            backend = %self.label,
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage stream put successful"
        );

        Ok(bytes_copied)
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let location = Self::location(key)?;

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_err(key, e))?;

        let bytes = result.bytes().await.map_err(|e| map_store_err(key, e))?;

        Ok(bytes.to_vec())
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let location = Self::location(key)?;

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_err(key, e))?;

        let key = key.to_string();
        let stream = result
            .into_stream()
            .map(move |chunk| chunk.map_err(|e| map_store_err(&key, e)));

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Self::location(key)?;

        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Self::location(key)?;

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn probe(&self) -> StorageResult<()> {
        // A HEAD on a key that should not exist still proves the backend is
        // reachable and credentials are accepted.
        let location = Path::from("scanvault-health-probe");
        match self.store.head(&location).await {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use object_store::memory::InMemory;

    fn memory_storage() -> ObjectStoreStorage {
        ObjectStoreStorage::new(Arc::new(InMemory::new()), "memory")
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let storage = memory_storage();
        let data = b"hello object store".to_vec();

        storage.put("uploads/a.txt", data.clone()).await.unwrap();
        assert_eq!(storage.get("uploads/a.txt").await.unwrap(), data);
    }

    #[tokio::test]
    async fn stream_round_trip() {
        let storage = memory_storage();
        let data = vec![7u8; 128 * 1024];
        let reader = Box::pin(std::io::Cursor::new(data.clone()))
            as Pin<Box<dyn AsyncRead + Send + Unpin>>;

        let written = storage.put_stream("uploads/b.bin", reader).await.unwrap();
        assert_eq!(written, data.len() as u64);

        let mut stream = storage.get_stream("uploads/b.bin").await.unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let storage = memory_storage();
        assert!(matches!(
            storage.get("uploads/missing").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!storage.exists("uploads/missing").await.unwrap());
        assert!(storage.delete("uploads/missing").await.is_ok());
    }

    #[tokio::test]
    async fn invalid_keys_rejected() {
        let storage = memory_storage();
        assert!(matches!(
            storage.get("../escape").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.put("/absolute", vec![1]).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn probe_reports_reachable() {
        let storage = memory_storage();
        assert!(storage.probe().await.is_ok());
    }
}
