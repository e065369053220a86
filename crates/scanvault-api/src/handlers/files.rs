//! File record endpoints: status, download links, listing, and deletion.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use scanvault_core::models::{
    status_message, DownloadLinkResponse, FileInfo, FileListEntry, FileListResponse,
    FileStatusResponse, ScanStatus,
};
use scanvault_core::AppError;

const DEFAULT_PAGE_SIZE: u64 = 100;
const MAX_PAGE_SIZE: u64 = 1000;

#[utoipa::path(
    get,
    path = "/files/{id}/status",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata and scan status", body = FileStatusResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
pub async fn file_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileStatusResponse>, HttpAppError> {
    let record = state
        .records
        .get(id)
        .await
        .map_err(HttpAppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

    let message = status_message(record.scan_status).to_string();
    Ok(Json(FileStatusResponse {
        file_info: FileInfo::from(record),
        message,
    }))
}

#[utoipa::path(
    get,
    path = "/files/{id}/download-link",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Short-lived signed download link", body = DownloadLinkResponse),
        (status = 403, description = "File is infected", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 409, description = "Scan has not finished yet", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn create_download_link(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadLinkResponse>, HttpAppError> {
    let record = state
        .records
        .get(id)
        .await
        .map_err(HttpAppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

    if record.scan_status != ScanStatus::Clean {
        return Err(AppError::NotClean {
            status: record.scan_status,
        }
        .into());
    }

    let (token, expires_at) = state.tokens.issue(id).map_err(HttpAppError::from)?;
    tracing::info!(file_id = %id, %expires_at, "Download link issued");

    Ok(Json(DownloadLinkResponse {
        download_url: format!("/download/{}", token),
        expires_at,
        file_info: FileInfo::from(record),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u64,
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    params(
        ("skip" = Option<u64>, Query, description = "Records to skip"),
        ("limit" = Option<u64>, Query, description = "Page size (default 100, max 1000)")
    ),
    responses(
        (status = 200, description = "Paginated file listing, newest first", body = FileListResponse)
    )
)]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FileListResponse>, HttpAppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);

    let (records, total) = state
        .records
        .list(query.skip, limit)
        .await
        .map_err(HttpAppError::from)?;

    let files = records
        .into_iter()
        .map(|record| FileListEntry {
            file_id: record.id,
            filename: record.filename,
            file_size: record.size_bytes,
            upload_timestamp: record.upload_timestamp,
            scan_status: record.scan_status,
            download_count: record.download_count,
        })
        .collect();

    Ok(Json(FileListResponse {
        files,
        total,
        skip: query.skip,
        limit,
    }))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, HttpAppError> {
    let record = state
        .records
        .get(id)
        .await
        .map_err(HttpAppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

    // Object first: if this fails the record survives and the delete can be
    // retried; the reverse order would leak the object.
    state.storage.delete(&record.storage_key).await?;
    state.records.delete(id).await.map_err(HttpAppError::from)?;

    tracing::info!(file_id = %id, "File deleted");
    Ok(Json(json!({ "message": "File deleted successfully" })))
}
