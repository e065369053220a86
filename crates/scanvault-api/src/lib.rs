//! HTTP surface of ScanVault: upload intake, scan status, signed download
//! links, token-gated downloads, and health reporting.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
