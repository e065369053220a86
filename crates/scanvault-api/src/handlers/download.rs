//! Token-gated file download.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use scanvault_core::models::ScanStatus;
use scanvault_core::AppError;

#[utoipa::path(
    get,
    path = "/download/{token}",
    tag = "files",
    params(("token" = String, Path, description = "Signed download token")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "File is infected", body = ErrorResponse),
        (status = 404, description = "File no longer exists", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, token))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file_id = state.tokens.verify(&token)?;

    let record = state
        .records
        .get(file_id)
        .await
        .map_err(HttpAppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))?;

    // The scan verdict may have changed since the link was issued; re-check so
    // a token issued for a then-clean file can never serve an infected one.
    if record.scan_status != ScanStatus::Clean {
        return Err(AppError::NotClean {
            status: record.scan_status,
        }
        .into());
    }

    let stream = state.storage.get_stream(&record.storage_key).await?;

    // Only count downloads that actually started.
    state
        .records
        .record_download(file_id)
        .await
        .map_err(HttpAppError::from)?;

    tracing::info!(file_id = %file_id, filename = %record.filename, "Download started");

    let body_stream = stream.map(|chunk| {
        chunk.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = format!("attachment; filename=\"{}\"", record.filename);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.content_type.as_str())
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .header(header::CONTENT_LENGTH, record.size_bytes)
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
