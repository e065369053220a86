//! File intake: multipart upload, validation, storage, and scan enqueue.

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::Utc;
use futures::TryStreamExt;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use scanvault_core::models::{FileUploadResponse, NewFileRecord, ScanStatus};
use scanvault_core::AppError;
use scanvault_storage::keys::generate_object_key;

/// Slack on top of the file size limit for multipart framing overhead.
pub(crate) const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File accepted and queued for scanning", body = FileUploadResponse),
        (status = 400, description = "Invalid input or disallowed file type", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<FileUploadResponse>, HttpAppError> {
    let max_size = state.config.max_file_size_bytes;

    // Reject a declared-oversized body before reading any of it.
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(declared) = declared {
        if declared > max_size + MULTIPART_OVERHEAD_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {} bytes",
                max_size
            ))
            .into());
        }
    }

    let field = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?;
        match field {
            Some(field) if field.name() == Some("file") => break field,
            Some(_) => continue,
            None => {
                return Err(AppError::InvalidInput(
                    "Missing multipart field 'file'".to_string(),
                )
                .into())
            }
        }
    };

    let filename = field
        .file_name()
        .map(str::to_owned)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Uploaded file has no filename".to_string()))?;

    if !state.config.is_allowed_filename(&filename) {
        return Err(AppError::DisallowedType(filename).into());
    }

    let content_type = field
        .content_type()
        .map(str::to_owned)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let file_id = Uuid::new_v4();
    let storage_key = generate_object_key(file_id, &filename);

    // Stream straight into storage, reading at most one byte over the limit so
    // oversized uploads are detected without buffering the whole file.
    let body = StreamReader::new(field.map_err(std::io::Error::other));
    let size_bytes = state
        .storage
        .put_stream(&storage_key, Box::pin(body.take(max_size + 1)))
        .await?;

    if size_bytes > max_size {
        // Roll the partial object back before rejecting.
        if let Err(e) = state.storage.delete(&storage_key).await {
            tracing::error!(error = %e, key = %storage_key, "Failed to roll back oversized upload");
        }
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the maximum size of {} bytes",
            max_size
        ))
        .into());
    }

    if size_bytes == 0 {
        if let Err(e) = state.storage.delete(&storage_key).await {
            tracing::error!(error = %e, key = %storage_key, "Failed to roll back empty upload");
        }
        return Err(AppError::InvalidInput("Empty file not allowed".to_string()).into());
    }

    let record = match state
        .records
        .create(NewFileRecord {
            id: file_id,
            filename: filename.clone(),
            content_type,
            size_bytes: size_bytes as i64,
            storage_key: storage_key.clone(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(state.config.file_ttl)
                    .map_err(|e| AppError::Internal(format!("Invalid file TTL: {}", e)))?,
        })
        .await
    {
        Ok(record) => record,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&storage_key).await {
                tracing::error!(error = %cleanup, key = %storage_key, "Failed to roll back upload");
            }
            return Err(e.into());
        }
    };

    let task = match state
        .queue
        .enqueue(file_id, state.config.scan_max_retries as i32)
        .await
    {
        Ok(task) => task,
        Err(e) => {
            // Without a queued scan the file would sit in pending forever.
            if let Err(cleanup) = state.records.delete(file_id).await {
                tracing::error!(error = %cleanup, file_id = %file_id, "Failed to roll back record");
            }
            if let Err(cleanup) = state.storage.delete(&storage_key).await {
                tracing::error!(error = %cleanup, key = %storage_key, "Failed to roll back upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        file_id = %file_id,
        task_id = %task.id,
        filename = %record.filename,
        size_bytes,
        "File uploaded and queued for scanning"
    );

    Ok(Json(FileUploadResponse {
        file_id,
        filename: record.filename,
        file_size: record.size_bytes,
        upload_timestamp: record.upload_timestamp,
        scan_status: ScanStatus::Pending,
        task_id: task.id,
    }))
}
