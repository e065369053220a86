//! Configuration module
//!
//! Environment-driven configuration for the API, worker pool, storage backends,
//! and the record store. `Config::from_env` reads everything once at startup;
//! components receive the pieces they need by value or reference.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants;

/// Which object storage backend holds uploaded bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
    Azure,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            "azure" => Ok(StorageBackend::Azure),
            other => Err(anyhow::anyhow!("Invalid storage backend: {}", other)),
        }
    }
}

/// Which backend persists file records and scan tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStoreBackend {
    Postgres,
    /// In-process store; development and tests only. State is lost on restart.
    Memory,
}

impl FromStr for RecordStoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(RecordStoreBackend::Postgres),
            "memory" => Ok(RecordStoreBackend::Memory),
            other => Err(anyhow::anyhow!("Invalid record store backend: {}", other)),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,

    // Record store
    pub record_store_backend: RecordStoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,

    // Object storage
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub azure_container: Option<String>,

    // Upload validation
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,

    // Scan engine
    pub clamav_host: String,
    pub clamav_port: u16,
    pub virus_scan_timeout: Duration,

    // Download tokens
    pub download_token_secret: String,
    pub download_token_ttl: Duration,

    // Scan queue / worker pool
    pub scan_max_workers: usize,
    pub scan_poll_interval: Duration,
    pub scan_max_retries: u32,
    pub scan_lease: Duration,
    pub scan_reap_interval: Duration,

    // Retention
    pub file_ttl: Duration,
    pub cleanup_interval: Duration,
    pub purge_infected: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, v)),
        Err(_) => Ok(default),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = Config {
            server_port: env_or("SERVER_PORT", 8000)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            cors_origins: env_list("CORS_ORIGINS", &["*"]),

            record_store_backend: env_or("STORE_BACKEND", RecordStoreBackend::Postgres)?,
            database_url: env_opt("DATABASE_URL"),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 20)?,

            storage_backend: env_or("STORAGE_BACKEND", StorageBackend::Local)?,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./uploads".to_string()),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            azure_container: env_opt("AZURE_CONTAINER"),

            max_file_size_bytes: env_or(
                "MAX_FILE_SIZE_BYTES",
                constants::DEFAULT_MAX_FILE_SIZE_BYTES,
            )?,
            allowed_extensions: env_list(
                "ALLOWED_EXTENSIONS",
                constants::DEFAULT_ALLOWED_EXTENSIONS,
            ),

            clamav_host: env::var("CLAMAV_HOST").unwrap_or_else(|_| "localhost".to_string()),
            clamav_port: env_or("CLAMAV_PORT", 3310)?,
            virus_scan_timeout: Duration::from_secs(env_or(
                "VIRUS_SCAN_TIMEOUT_SECS",
                constants::DEFAULT_VIRUS_SCAN_TIMEOUT_SECS,
            )?),

            download_token_secret: env::var("DOWNLOAD_TOKEN_SECRET")
                .unwrap_or_else(|_| "change-this-in-production".to_string()),
            download_token_ttl: Duration::from_secs(env_or(
                "DOWNLOAD_TOKEN_TTL_SECS",
                constants::DEFAULT_DOWNLOAD_TOKEN_TTL_SECS,
            )?),

            scan_max_workers: env_or("SCAN_MAX_WORKERS", 4)?,
            scan_poll_interval: Duration::from_millis(env_or("SCAN_POLL_INTERVAL_MS", 1000)?),
            scan_max_retries: env_or("SCAN_MAX_RETRIES", 3)?,
            scan_lease: Duration::from_secs(env_or("SCAN_LEASE_SECS", 600)?),
            scan_reap_interval: Duration::from_secs(env_or("SCAN_REAP_INTERVAL_SECS", 60)?),

            file_ttl: Duration::from_secs(env_or(
                "FILE_TTL_SECS",
                constants::DEFAULT_FILE_TTL_SECS,
            )?),
            cleanup_interval: Duration::from_secs(env_or("CLEANUP_INTERVAL_SECS", 300)?),
            purge_infected: env_or("PURGE_INFECTED", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.record_store_backend == RecordStoreBackend::Postgres
            && self.database_url.is_none()
        {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            anyhow::bail!("S3_BUCKET is required when STORAGE_BACKEND=s3");
        }
        if self.storage_backend == StorageBackend::Azure && self.azure_container.is_none() {
            anyhow::bail!("AZURE_CONTAINER is required when STORAGE_BACKEND=azure");
        }
        if self.is_production() && self.download_token_secret == "change-this-in-production" {
            anyhow::bail!("DOWNLOAD_TOKEN_SECRET must be set in production");
        }
        if self.scan_max_workers == 0 {
            anyhow::bail!("SCAN_MAX_WORKERS must be at least 1");
        }
        if self.max_file_size_bytes == 0 {
            anyhow::bail!("MAX_FILE_SIZE_BYTES must be non-zero");
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Whether the filename's extension is on the allow-list.
    pub fn is_allowed_filename(&self, filename: &str) -> bool {
        let ext = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!(".{}", ext.to_lowercase()),
            _ => return false,
        };
        self.allowed_extensions.iter().any(|a| *a == ext)
    }
}
