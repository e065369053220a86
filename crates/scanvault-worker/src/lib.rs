//! Background scanning pipeline: worker pool, lease reaper, and retention
//! sweeper.
//!
//! Shutdown: [`ScanWorker::shutdown`] signals the pool to stop; it does not
//! wait for in-flight scans. For graceful shutdown, coordinate with your
//! runtime and allow time for running scans to finish before process exit.

mod context;
mod pool;

pub use context::ScanContext;
pub use pool::{ScanWorker, ScanWorkerConfig};
