use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Clean,
    Infected(String),
    Error(String),
}

/// Something that can tell whether uploaded bytes are safe to store.
#[async_trait]
pub trait VirusScanner: Send + Sync {
    async fn scan(&self, data: Bytes) -> ScanResult;
}
