//! ScanVault Core Library
//!
//! This crate provides core domain models, error types, configuration, and constants
//! that are shared across all ScanVault components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, RecordStoreBackend, StorageBackend};
pub use error::{AppError, LogLevel};
