//! Virus scanning against a ClamAV daemon.

use async_trait::async_trait;
use clamav_client::{clean, Tcp};
use std::str;
use std::time::{Duration, Instant};

/// Outcome of scanning one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    Infected { threat_name: String },
    /// The engine could not produce a verdict. Callers retry; they never treat
    /// this as clean.
    Error { message: String },
}

#[async_trait]
pub trait VirusScanner: Send + Sync {
    async fn scan(&self, data: &[u8]) -> ScanVerdict;

    /// Engine version string, if the engine can report one.
    async fn engine_version(&self) -> Option<String>;

    /// Reachability check for health reporting.
    async fn probe(&self) -> anyhow::Result<()>;
}

/// Scanner backed by a ClamAV daemon over TCP (INSTREAM protocol).
#[derive(Clone)]
pub struct ClamAvScanner {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ClamAvScanner {
    pub fn new(host: String, port: u16, timeout: Duration) -> Self {
        Self {
            host,
            port,
            timeout,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Pull the threat name out of a "stream: Eicar-Signature FOUND" style reply.
fn parse_threat_name(response_bytes: &[u8]) -> String {
    let response_str = match str::from_utf8(response_bytes) {
        Ok(s) => s.trim(),
        Err(_) => return "unknown".to_string(),
    };
    if response_str.contains("FOUND") {
        response_str
            .split(':')
            .nth(1)
            .unwrap_or("unknown")
            .split_whitespace()
            .next()
            .unwrap_or("unknown")
            .to_string()
    } else {
        "unknown".to_string()
    }
}

#[async_trait]
impl VirusScanner for ClamAvScanner {
    /// Scan in-memory data using the sync API inside spawn_blocking to avoid
    /// !Send tokio futures.
    async fn scan(&self, data: &[u8]) -> ScanVerdict {
        let start = Instant::now();
        tracing::debug!(host = %self.host, port = %self.port, size = data.len(), "Starting ClamAV scan");
        let data = data.to_vec();
        let address = self.address();

        let result = tokio::time::timeout(
            self.timeout,
            tokio::task::spawn_blocking(move || {
                let connection = Tcp {
                    host_address: address.as_str(),
                };
                match clamav_client::scan_buffer(data.as_slice(), connection, None) {
                    Ok(response_bytes) => match clean(&response_bytes) {
                        Ok(true) => {
                            tracing::info!(
                                duration_ms = start.elapsed().as_millis() as u64,
                                "Scan completed: clean"
                            );
                            ScanVerdict::Clean
                        }
                        Ok(false) => {
                            let threat_name = parse_threat_name(&response_bytes);
                            tracing::warn!(
                                duration_ms = start.elapsed().as_millis() as u64,
                                threat = %threat_name,
                                "Scan detected threat"
                            );
                            ScanVerdict::Infected { threat_name }
                        }
                        Err(e) => {
                            let message = format!("Failed to parse ClamAV response: {}", e);
                            tracing::error!(error = %message, "ClamAV response unparseable");
                            ScanVerdict::Error { message }
                        }
                    },
                    Err(e) => {
                        let message = format!("ClamAV scan error: {}", e);
                        tracing::error!(error = %message, "ClamAV scan failed");
                        ScanVerdict::Error { message }
                    }
                }
            }),
        )
        .await;

        match result {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                let message = format!("ClamAV scan task join error: {}", e);
                tracing::error!(error = %message, "ClamAV scan panicked");
                ScanVerdict::Error { message }
            }
            Err(_) => {
                let message =
                    format!("ClamAV scan timeout (exceeded {} seconds)", self.timeout.as_secs());
                tracing::error!(error = %message, "ClamAV scan timeout");
                ScanVerdict::Error { message }
            }
        }
    }

    async fn engine_version(&self) -> Option<String> {
        let address = self.address();
        let result = tokio::task::spawn_blocking(move || {
            let connection = Tcp {
                host_address: address.as_str(),
            };
            clamav_client::get_version(connection)
        })
        .await;

        match result {
            Ok(Ok(bytes)) => str::from_utf8(&bytes)
                .ok()
                .map(|s| s.trim_end_matches('\0').trim().to_string()),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Failed to query ClamAV version");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "ClamAV version query panicked");
                None
            }
        }
    }

    async fn probe(&self) -> anyhow::Result<()> {
        let address = self.address();
        let response = tokio::task::spawn_blocking(move || {
            let connection = Tcp {
                host_address: address.as_str(),
            };
            clamav_client::ping(connection)
        })
        .await?
        .map_err(|e| anyhow::anyhow!("ClamAV ping failed: {}", e))?;

        if response.starts_with(b"PONG") {
            Ok(())
        } else {
            anyhow::bail!("Unexpected ClamAV ping response")
        }
    }
}
