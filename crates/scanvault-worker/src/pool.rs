//! Worker pool: polling claim loop, bounded concurrency, and periodic reapers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;

use crate::context::ScanContext;

/// How many expired records one retention sweep may remove.
const CLEANUP_BATCH_SIZE: i64 = 100;

#[derive(Clone)]
pub struct ScanWorkerConfig {
    pub max_workers: usize,
    pub poll_interval: Duration,
    /// Lease granted on each claim; a worker must finish (or nack) before it
    /// lapses or the reaper reclaims the task.
    pub lease: Duration,
    /// Interval between runs of the expired-lease reaper.
    pub reap_interval: Duration,
    /// Interval between retention sweeps of expired files.
    pub cleanup_interval: Duration,
}

impl Default for ScanWorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval: Duration::from_millis(1000),
            lease: Duration::from_secs(600),
            reap_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

pub struct ScanWorker {
    shutdown_tx: mpsc::Sender<()>,
}

impl ScanWorker {
    /// Spawn the worker pool and its reapers.
    pub fn start(context: Arc<ScanContext>, config: ScanWorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::worker_pool(context, config, shutdown_rx).await;
        });

        Self { shutdown_tx }
    }

    async fn worker_pool(
        context: Arc<ScanContext>,
        config: ScanWorkerConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "Scan worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        {
            let ctx = context.clone();
            let reap_interval = config.reap_interval;
            let cleanup_interval = config.cleanup_interval;
            tokio::spawn(async move {
                let mut reap = tokio::time::interval(reap_interval);
                reap.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                let mut cleanup = tokio::time::interval(cleanup_interval);
                cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = reap.tick() => {
                            if let Err(e) = ctx.reclaim_expired_leases().await {
                                tracing::error!(error = %e, "Lease reaper failed");
                            }
                        }
                        _ = cleanup.tick() => {
                            if let Err(e) = ctx.purge_expired_files(CLEANUP_BATCH_SIZE).await {
                                tracing::error!(error = %e, "Retention sweep failed");
                            }
                        }
                        _ = reaper_shutdown_rx.recv() => break,
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Scan worker pool shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                _ = sleep(config.poll_interval) => {
                    Self::claim_and_dispatch_one(&context, &semaphore, config.lease).await;
                }
            }
        }

        tracing::info!("Scan worker pool stopped");
    }

    async fn claim_and_dispatch_one(
        context: &Arc<ScanContext>,
        semaphore: &Arc<Semaphore>,
        lease: Duration,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return;
            }
        };

        match context.queue.claim(lease).await {
            Ok(Some(task)) => {
                let ctx = context.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = ctx.process(&task).await {
                        tracing::error!(error = %e, task_id = %task.id, "Scan task processing failed");
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No scan tasks available");
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim scan task");
            }
        }
    }

    /// Signals the pool to stop claiming tasks and exit the main loop. Returns
    /// immediately; in-flight scans keep running until they finish.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating scan worker shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}
