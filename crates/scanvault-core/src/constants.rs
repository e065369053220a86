//! Shared constants.

/// Default cap on upload size: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Default retention for file records and their storage objects: 7 days.
pub const DEFAULT_FILE_TTL_SECS: u64 = 7 * 24 * 3600;

/// Default lifetime of a signed download link: 24 hours.
pub const DEFAULT_DOWNLOAD_TOKEN_TTL_SECS: u64 = 24 * 3600;

/// Default per-scan timeout: 5 minutes.
pub const DEFAULT_VIRUS_SCAN_TIMEOUT_SECS: u64 = 300;

/// Extensions accepted when `ALLOWED_EXTENSIONS` is not set.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".txt", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".jpg", ".jpeg", ".png",
    ".gif", ".zip", ".rar", ".tar", ".gz",
];
