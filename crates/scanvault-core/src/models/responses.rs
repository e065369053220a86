//! API response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{FileRecord, ScanReport, ScanStatus};

/// Full client-facing view of a file record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub content_type: String,
    pub upload_timestamp: DateTime<Utc>,
    pub scan_status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_result: Option<ScanReport>,
    pub download_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_downloaded: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl From<FileRecord> for FileInfo {
    fn from(record: FileRecord) -> Self {
        FileInfo {
            file_id: record.id,
            filename: record.filename,
            file_size: record.size_bytes,
            content_type: record.content_type,
            upload_timestamp: record.upload_timestamp,
            scan_status: record.scan_status,
            scan_result: record.scan_report,
            download_count: record.download_count,
            last_downloaded: record.last_downloaded_at,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileUploadResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub upload_timestamp: DateTime<Utc>,
    pub scan_status: ScanStatus,
    pub task_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileStatusResponse {
    pub file_info: FileInfo,
    /// Human-readable summary keyed by scan status.
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadLinkResponse {
    /// Relative URL embedding the signed download token.
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub file_info: FileInfo,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListEntry {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub upload_timestamp: DateTime<Utc>,
    pub scan_status: ScanStatus,
    pub download_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileListEntry>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Human-readable summary for a scan status, returned by the status endpoint.
pub fn status_message(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Pending => "File uploaded successfully. Virus scan is pending.",
        ScanStatus::Scanning => "File is currently being scanned for viruses.",
        ScanStatus::Clean => "File is clean and safe to download.",
        ScanStatus::Infected => "File contains viruses and is not safe to download.",
        ScanStatus::Error => "Virus scan failed. Please contact support.",
    }
}
