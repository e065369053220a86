//! Wires configuration into stores, services, and the scan worker.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::state::AppState;
use scanvault_core::Config;
use scanvault_db::create_stores;
use scanvault_services::{ClamAvScanner, DownloadTokenService, VirusScanner};
use scanvault_storage::create_storage;
use scanvault_worker::{ScanContext, ScanWorker, ScanWorkerConfig};

pub async fn initialize_services(config: Config) -> Result<(AppState, ScanWorker)> {
    let (records, queue) = create_stores(&config)
        .await
        .context("Failed to initialize record store and scan queue")?;

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize object storage")?;

    let scanner: Arc<dyn VirusScanner> = Arc::new(ClamAvScanner::new(
        config.clamav_host.clone(),
        config.clamav_port,
        config.virus_scan_timeout,
    ));

    let tokens = Arc::new(DownloadTokenService::new(
        &config.download_token_secret,
        config.download_token_ttl.as_secs() as i64,
    ));

    let worker = ScanWorker::start(
        Arc::new(ScanContext {
            records: records.clone(),
            queue: queue.clone(),
            storage: storage.clone(),
            scanner: scanner.clone(),
            purge_infected: config.purge_infected,
        }),
        ScanWorkerConfig {
            max_workers: config.scan_max_workers,
            poll_interval: config.scan_poll_interval,
            lease: config.scan_lease,
            reap_interval: config.scan_reap_interval,
            cleanup_interval: config.cleanup_interval,
        },
    );

    let state = AppState {
        config: Arc::new(config),
        records,
        queue,
        storage,
        scanner,
        tokens,
    };

    Ok((state, worker))
}
