use crate::scanner::{ScanResult, VirusScanner};
use async_trait::async_trait;
use bytes::Bytes;
use clamav_client::{clean, Tcp};
use std::time::{Duration, Instant};

/// ClamAV daemon client. One TCP connection per scan, content sent with
/// INSTREAM.
#[derive(Clone)]
pub struct ClamAVService {
    host: String,
    port: u16,
    /// Treat scanner failures and timeouts as errors instead of letting the
    /// upload through.
    fail_closed: bool,
    timeout_secs: u64,
}

impl ClamAVService {
    pub fn new(host: String, port: u16, fail_closed: bool) -> Self {
        Self::with_timeout(host, port, fail_closed, 30)
    }

    pub fn with_timeout(host: String, port: u16, fail_closed: bool, timeout_secs: u64) -> Self {
        Self {
            host,
            port,
            fail_closed,
            timeout_secs,
        }
    }

    fn failure(&self, message: String) -> ScanResult {
        if self.fail_closed {
            ScanResult::Error(message)
        } else {
            tracing::warn!(error = %message, "ClamAV scan failed, continuing (fail-open)");
            ScanResult::Clean
        }
    }

    /// Scan in-memory data. The client is synchronous, so the scan runs on
    /// the blocking pool under a timeout.
    pub async fn scan_bytes(&self, data: Bytes) -> ScanResult {
        let start = Instant::now();
        let address = format!("{}:{}", self.host, self.port);
        tracing::debug!(address = %address, size_bytes = data.len(), "Starting ClamAV scan");

        let scan = tokio::task::spawn_blocking(move || {
            let connection = Tcp {
                host_address: address.as_str(),
            };
            let response = clamav_client::scan_buffer(&data, connection, None)
                .map_err(|e| format!("ClamAV scan error: {}", e))?;
            let is_clean = clean(&response)
                .map_err(|e| format!("Failed to parse ClamAV response: {}", e))?;
            Ok::<_, String>((is_clean, response))
        });

        let outcome = tokio::time::timeout(Duration::from_secs(self.timeout_secs), scan).await;

        match outcome {
            Ok(Ok(Ok((true, _)))) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "File scan completed: clean"
                );
                ScanResult::Clean
            }
            Ok(Ok(Ok((false, response)))) => {
                let virus = virus_name(&response);
                tracing::warn!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    virus = %virus,
                    "File scan detected virus"
                );
                ScanResult::Infected(virus)
            }
            Ok(Ok(Err(message))) => {
                tracing::error!(error = %message, "ClamAV scan failed");
                self.failure(message)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "ClamAV scan task panicked");
                ScanResult::Error(format!("ClamAV scan task join error: {}", e))
            }
            Err(_) => {
                let message = format!(
                    "ClamAV scan timeout (exceeded {} seconds)",
                    self.timeout_secs
                );
                tracing::error!(error = %message, "ClamAV scan timeout");
                self.failure(message)
            }
        }
    }
}

#[async_trait]
impl VirusScanner for ClamAVService {
    async fn scan(&self, data: Bytes) -> ScanResult {
        self.scan_bytes(data).await
    }
}

/// Pull the signature name out of a reply like `stream: Eicar-Test-Signature FOUND`.
fn virus_name(response: &[u8]) -> String {
    let text = String::from_utf8_lossy(response);
    let text = text.trim().trim_end_matches('\0');
    text.strip_suffix("FOUND")
        .and_then(|rest| rest.split(':').nth(1))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
