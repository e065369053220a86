pub mod file_record;
pub mod responses;
pub mod scan_task;

pub use file_record::{FileRecord, NewFileRecord, ScanReport, ScanStatus};
pub use responses::{
    status_message, DownloadLinkResponse, FileInfo, FileListEntry, FileListResponse,
    FileStatusResponse, FileUploadResponse,
};
pub use scan_task::{ScanTask, TaskState};
