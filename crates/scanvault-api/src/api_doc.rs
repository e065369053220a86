//! OpenAPI documentation, served at `/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use scanvault_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ScanVault API",
        version = "0.1.0",
        description = "Secure file upload service with asynchronous malware scanning. \
            Uploaded files are scanned in the background; downloads require a \
            short-lived signed link and are only served for clean files."
    ),
    paths(
        handlers::upload::upload_file,
        handlers::files::file_status,
        handlers::files::create_download_link,
        handlers::files::list_files,
        handlers::files::delete_file,
        handlers::download::download_file,
        handlers::health::health,
        handlers::health::root,
    ),
    components(schemas(
        models::FileInfo,
        models::FileUploadResponse,
        models::FileStatusResponse,
        models::DownloadLinkResponse,
        models::FileListEntry,
        models::FileListResponse,
        models::ScanStatus,
        models::ScanReport,
        error::ErrorResponse,
        handlers::health::HealthResponse,
        handlers::health::ComponentHealth,
    )),
    tags(
        (name = "files", description = "Upload, status, download links, and deletion"),
        (name = "system", description = "Health and service metadata")
    )
)]
pub struct ApiDoc;
