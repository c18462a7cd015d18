//! Metadata vs content inventory reconciliation.
//!
//! Both inventories are listed in full before they are compared, and the
//! comparison finishes before anything is deleted. Nothing is re-checked
//! between listing and deletion, so a file uploaded mid-run can be reported;
//! repairs are best effort and stop at the first failed deletion.

use filegate_core::{AppError, FileSummary, ForwardedHeaders};
use filegate_metadata::MetadataStore;
use filegate_storage::keys::file_id_from_key;
use filegate_storage::ContentStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Uploaded records with no object behind them.
pub fn broken_metadata(files: &[FileSummary], keys: &[String]) -> Vec<FileSummary> {
    let stored: HashSet<&str> = keys.iter().map(|k| file_id_from_key(k)).collect();
    files
        .iter()
        .filter(|f| f.is_uploaded && !stored.contains(f.id.to_string().as_str()))
        .cloned()
        .collect()
}

/// Objects whose id matches no record, whatever the record's state.
pub fn orphaned_content(files: &[FileSummary], keys: &[String]) -> Vec<String> {
    let known: HashSet<String> = files.iter().map(|f| f.id.to_string()).collect();
    keys.iter()
        .filter(|k| !known.contains(file_id_from_key(k)))
        .cloned()
        .collect()
}

/// Records whose upload never finished.
pub fn not_uploaded(files: &[FileSummary]) -> Vec<FileSummary> {
    files.iter().filter(|f| !f.is_uploaded).cloned().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    pub broken_metadata: Vec<FileSummary>,
    pub orphaned_content: Vec<String>,
    pub not_uploaded: Vec<FileSummary>,
}

impl InventoryReport {
    pub fn build(files: &[FileSummary], keys: &[String]) -> Self {
        Self {
            broken_metadata: broken_metadata(files, keys),
            orphaned_content: orphaned_content(files, keys),
            not_uploaded: not_uploaded(files),
        }
    }
}

#[derive(Clone)]
pub struct ReconcileService {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
}

impl ReconcileService {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { metadata, content }
    }

    async fn list_both(
        &self,
        headers: &ForwardedHeaders,
    ) -> Result<(Vec<FileSummary>, Vec<String>), AppError> {
        let start = Instant::now();
        let (files, keys) = tokio::try_join!(self.metadata.list_files(headers), async {
            self.content.list_files().await.map_err(AppError::from)
        })?;
        tracing::debug!(
            records = files.len(),
            objects = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Inventories listed"
        );
        Ok((files, keys))
    }

    #[tracing::instrument(skip(self, headers))]
    pub async fn report(&self, headers: &ForwardedHeaders) -> Result<InventoryReport, AppError> {
        let (files, keys) = self.list_both(headers).await?;
        Ok(InventoryReport::build(&files, &keys))
    }

    pub async fn list_broken_metadata(
        &self,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileSummary>, AppError> {
        let (files, keys) = self.list_both(headers).await?;
        Ok(broken_metadata(&files, &keys))
    }

    pub async fn list_orphans(&self, headers: &ForwardedHeaders) -> Result<Vec<String>, AppError> {
        let (files, keys) = self.list_both(headers).await?;
        Ok(orphaned_content(&files, &keys))
    }

    pub async fn list_not_uploaded(
        &self,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileSummary>, AppError> {
        let files = self.metadata.list_files(headers).await?;
        Ok(not_uploaded(&files))
    }

    /// Delete uploaded records that have no content. Returns what was removed.
    #[tracing::instrument(skip(self, headers))]
    pub async fn delete_broken_metadata(
        &self,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileSummary>, AppError> {
        let broken = self.list_broken_metadata(headers).await?;
        for file in &broken {
            self.metadata.delete_file_by_id(&file.id, headers).await?;
            tracing::info!(file_id = %file.id, bucket_id = %file.bucket_id, "Deleted broken metadata");
        }
        tracing::info!(count = broken.len(), "Broken metadata cleanup completed");
        Ok(broken)
    }

    /// Delete objects no record refers to. Returns the removed keys.
    #[tracing::instrument(skip(self, headers))]
    pub async fn delete_orphans(&self, headers: &ForwardedHeaders) -> Result<Vec<String>, AppError> {
        let orphans = self.list_orphans(headers).await?;
        for key in &orphans {
            self.content.delete_file(key).await?;
            tracing::info!(key = %key, "Deleted orphaned content");
        }
        tracing::info!(count = orphans.len(), "Orphaned content cleanup completed");
        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn summary(id: Uuid, is_uploaded: bool) -> FileSummary {
        FileSummary {
            id,
            name: format!("{}.bin", id),
            bucket_id: "default".to_string(),
            is_uploaded,
        }
    }

    #[test]
    fn test_report_classifies_each_set() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let files = vec![summary(a, true), summary(b, true), summary(c, false)];
        let keys = vec![format!("default/{}", a)];

        let report = InventoryReport::build(&files, &keys);

        assert_eq!(report.broken_metadata, vec![summary(b, true)]);
        assert!(report.orphaned_content.is_empty());
        assert_eq!(report.not_uploaded, vec![summary(c, false)]);
    }

    #[test]
    fn test_orphans_ignore_record_state() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let stray = Uuid::new_v4();
        let files = vec![summary(a, true), summary(b, false)];
        let keys = vec![
            format!("default/{}", a),
            format!("default/{}", b),
            format!("other/{}", stray),
        ];

        assert_eq!(
            orphaned_content(&files, &keys),
            vec![format!("other/{}", stray)]
        );
        assert!(broken_metadata(&files, &keys).is_empty());
    }

    #[test]
    fn test_empty_inventories() {
        let report = InventoryReport::build(&[], &[]);
        assert_eq!(report, InventoryReport::default());
    }
}
