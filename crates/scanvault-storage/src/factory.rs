use crate::{LocalStorage, ObjectStorage, ObjectStoreStorage, StorageError, StorageResult};
use scanvault_core::{Config, StorageBackend};
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn ObjectStorage>> {
    match config.storage_backend {
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path.clone()).await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::Config("S3_BUCKET not configured".to_string()))?;
            let region = config
                .s3_region
                .clone()
                .ok_or_else(|| StorageError::Config("S3_REGION not configured".to_string()))?;
            let storage = ObjectStoreStorage::s3(bucket, region, config.s3_endpoint.clone())?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Azure => {
            let container = config.azure_container.clone().ok_or_else(|| {
                StorageError::Config("AZURE_CONTAINER not configured".to_string())
            })?;
            let storage = ObjectStoreStorage::azure(container)?;
            Ok(Arc::new(storage))
        }
    }
}
