use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Scan state of an uploaded file.
///
/// `Clean`, `Infected`, and `Error` are terminal: once a record reaches one of
/// them, no further scan transitions occur.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema,
)]
#[sqlx(type_name = "scan_status", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Clean,
    Infected,
    Error,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Clean | ScanStatus::Infected | ScanStatus::Error
        )
    }
}

impl Display for ScanStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Scanning => write!(f, "scanning"),
            ScanStatus::Clean => write!(f, "clean"),
            ScanStatus::Infected => write!(f, "infected"),
            ScanStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ScanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "scanning" => Ok(ScanStatus::Scanning),
            "clean" => Ok(ScanStatus::Clean),
            "infected" => Ok(ScanStatus::Infected),
            "error" => Ok(ScanStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid scan status: {}", s)),
        }
    }
}

/// Result of a completed (or failed) scan, stored alongside the record once the
/// file reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ScanReport {
    /// Engine signature/version string as reported by the scanner.
    pub engine_version: Option<String>,
    /// Name of the detected threat. Present only for infected files.
    pub threat_name: Option<String>,
    pub scan_duration_ms: i64,
    pub scanned_at: DateTime<Utc>,
    /// Failure description when the terminal status is `error`.
    pub error_message: Option<String>,
}

/// Persistent metadata and scan state for one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Opaque reference into the storage backend. Immutable once set.
    pub storage_key: String,
    pub scan_status: ScanStatus,
    pub scan_report: Option<ScanReport>,
    pub upload_timestamp: DateTime<Utc>,
    pub download_count: i64,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    /// After this instant the record and its storage object may be reaped.
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a file record. The store initializes scan state to
/// `pending` and download statistics to zero.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub expires_at: DateTime<Utc>,
}
