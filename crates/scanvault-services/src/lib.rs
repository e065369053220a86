//! ScanVault domain services: virus scanning and signed download tokens.

pub mod scanner;
pub mod token;

pub use scanner::{ClamAvScanner, ScanVerdict, VirusScanner};
pub use token::{DownloadTokenService, TokenError};
