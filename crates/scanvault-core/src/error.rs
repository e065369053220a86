//! Error types module
//!
//! All errors are unified under the `AppError` enum, which maps every failure to
//! an HTTP status, a machine-readable code, and a log level. The taxonomy:
//! validation errors are rejected synchronously and never queued; transient
//! infrastructure errors are retried at the worker/queue boundary; permanent
//! infrastructure errors surface as a terminal `error` scan status; security
//! errors (bad tokens) surface as access-denied and are logged for audit;
//! compare-and-set conflicts are resolved by discarding the losing update.

use crate::models::ScanStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues and access denials
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File type not allowed: {0}")]
    DisallowedType(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File is not clean (scan status: {status})")]
    NotClean { status: ScanStatus },

    #[error("Invalid download token: {0}")]
    InvalidToken(String),

    #[error("Download token expired")]
    ExpiredToken,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record store error: {0}")]
    RecordStore(String),

    #[error("Scan engine error: {0}")]
    ScanEngine(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// HTTP status code to return
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::InvalidInput(_) | AppError::DisallowedType(_) => 400,
            AppError::PayloadTooLarge(_) => 413,
            AppError::NotFound(_) => 404,
            // Infected files are forbidden outright; files that have not finished
            // scanning conflict with the request, not with access rights.
            AppError::NotClean { status } => match status {
                ScanStatus::Infected => 403,
                ScanStatus::Pending | ScanStatus::Scanning => 409,
                ScanStatus::Error | ScanStatus::Clean => 500,
            },
            AppError::InvalidToken(_) | AppError::ExpiredToken => 401,
            AppError::Conflict(_) => 409,
            AppError::ScanEngine(_) => 503,
            AppError::Storage(_)
            | AppError::RecordStore(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => 500,
        }
    }

    /// Machine-readable error code (e.g. "FILE_TOO_LARGE")
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::DisallowedType(_) => "FILE_TYPE_NOT_ALLOWED",
            AppError::PayloadTooLarge(_) => "FILE_TOO_LARGE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NotClean { .. } => "FILE_NOT_CLEAN",
            AppError::InvalidToken(_) => "INVALID_DOWNLOAD_TOKEN",
            AppError::ExpiredToken => "DOWNLOAD_TOKEN_EXPIRED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::RecordStore(_) => "RECORD_STORE_ERROR",
            AppError::ScanEngine(_) => "SCAN_ENGINE_ERROR",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        match self {
            AppError::InvalidInput(_)
            | AppError::DisallowedType(_)
            | AppError::PayloadTooLarge(_)
            | AppError::NotFound(_)
            | AppError::NotClean { .. } => LogLevel::Debug,
            AppError::InvalidToken(_) | AppError::ExpiredToken | AppError::Conflict(_) => {
                LogLevel::Warn
            }
            AppError::Storage(_)
            | AppError::RecordStore(_)
            | AppError::ScanEngine(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => LogLevel::Error,
        }
    }

    /// Whether internal details should be hidden from clients in production
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            AppError::Storage(_)
                | AppError::RecordStore(_)
                | AppError::Internal(_)
                | AppError::InternalWithSource { .. }
        )
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}
