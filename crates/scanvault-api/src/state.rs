//! Application state shared by all handlers.

use std::sync::Arc;

use scanvault_core::Config;
use scanvault_db::{FileRecordStore, ScanTaskQueue};
use scanvault_services::{DownloadTokenService, VirusScanner};
use scanvault_storage::ObjectStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub records: Arc<dyn FileRecordStore>,
    pub queue: Arc<dyn ScanTaskQueue>,
    pub storage: Arc<dyn ObjectStorage>,
    pub scanner: Arc<dyn VirusScanner>,
    pub tokens: Arc<DownloadTokenService>,
}
