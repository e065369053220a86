//! Postgres-backed record store.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{CasOutcome, FileRecordStore};
use crate::{StoreError, StoreResult};
use scanvault_core::models::{FileRecord, NewFileRecord, ScanReport, ScanStatus};

const RECORD_COLUMNS: &str = r#"
    id,
    filename,
    content_type,
    size_bytes,
    storage_key,
    scan_status,
    scan_report,
    upload_timestamp,
    download_count,
    last_downloaded_at,
    expires_at
"#;

#[derive(sqlx::FromRow)]
struct FileRecordRow {
    id: Uuid,
    filename: String,
    content_type: String,
    size_bytes: i64,
    storage_key: String,
    scan_status: ScanStatus,
    scan_report: Option<Json<ScanReport>>,
    upload_timestamp: DateTime<Utc>,
    download_count: i64,
    last_downloaded_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

impl From<FileRecordRow> for FileRecord {
    fn from(row: FileRecordRow) -> Self {
        FileRecord {
            id: row.id,
            filename: row.filename,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            storage_key: row.storage_key,
            scan_status: row.scan_status,
            scan_report: row.scan_report.map(|j| j.0),
            upload_timestamp: row.upload_timestamp,
            download_count: row.download_count,
            last_downloaded_at: row.last_downloaded_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct PostgresFileRecordStore {
    pool: PgPool,
}

impl PostgresFileRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordStore for PostgresFileRecordStore {
    #[tracing::instrument(skip(self, new), fields(file_id = %new.id))]
    async fn create(&self, new: NewFileRecord) -> StoreResult<FileRecord> {
        let query = format!(
            r#"
            INSERT INTO file_records (id, filename, content_type, size_bytes, storage_key, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let row: FileRecordRow = sqlx::query_as::<Postgres, FileRecordRow>(&query)
            .bind(new.id)
            .bind(&new.filename)
            .bind(&new.content_type)
            .bind(new.size_bytes)
            .bind(&new.storage_key)
            .bind(new.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false)
                {
                    StoreError::DuplicateId(new.id)
                } else {
                    StoreError::Other(anyhow::anyhow!("Failed to insert file record: {}", e))
                }
            })?;

        tracing::info!(file_id = %row.id, "File record created");
        Ok(row.into())
    }

    async fn get(&self, file_id: Uuid) -> StoreResult<Option<FileRecord>> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM file_records WHERE id = $1");

        let row: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&query)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch file record")?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self, report))]
    async fn compare_and_set_status(
        &self,
        file_id: Uuid,
        expected: ScanStatus,
        new: ScanStatus,
        report: Option<ScanReport>,
    ) -> StoreResult<CasOutcome> {
        let query = format!(
            r#"
            UPDATE file_records
            SET scan_status = $3,
                scan_report = COALESCE($4, scan_report)
            WHERE id = $1 AND scan_status = $2
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let updated: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&query)
            .bind(file_id)
            .bind(expected)
            .bind(new)
            .bind(report.map(Json))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to compare-and-set scan status")?;

        if updated.is_some() {
            tracing::debug!(
                file_id = %file_id,
                from = %expected,
                to = %new,
                "Scan status advanced"
            );
            return Ok(CasOutcome::Updated);
        }

        // Distinguish a lost race from a missing record.
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM file_records WHERE id = $1")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check file record existence")?;

        if exists.is_some() {
            Ok(CasOutcome::Conflict)
        } else {
            Ok(CasOutcome::NotFound)
        }
    }

    async fn record_download(&self, file_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE file_records
            SET download_count = download_count + 1,
                last_downloaded_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(file_id)
        .execute(&self.pool)
        .await
        .context("Failed to record download")?;

        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<FileRecord>> {
        let query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM file_records
            WHERE expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#
        );

        let rows: Vec<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expired file records")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list(&self, skip: u64, limit: u64) -> StoreResult<(Vec<FileRecord>, u64)> {
        let query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM file_records
            ORDER BY upload_timestamp DESC
            OFFSET $1
            LIMIT $2
            "#
        );

        let rows: Vec<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&query)
            .bind(skip as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list file records")?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM file_records")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count file records")?;

        Ok((rows.into_iter().map(Into::into).collect(), total as u64))
    }

    async fn delete(&self, file_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM file_records WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete file record")?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Record store unreachable")?;
        Ok(())
    }
}
