//! Collaborator wiring: content store, metadata catalog, scanner, pipeline.

use crate::state::AppState;
use anyhow::{Context, Result};
use filegate_core::Config;
use filegate_metadata::{GraphqlMetadataStore, MetadataStore};
use filegate_processing::ImagePipeline;
#[cfg(feature = "clamav")]
use filegate_services::ClamAVService;
use filegate_services::{FileService, VirusScanner};
use filegate_storage::create_storage;
use std::sync::Arc;
use std::time::Duration;

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let content = create_storage(config)
        .await
        .context("Failed to initialize content store")?;
    tracing::info!(backend = %content.backend_type(), "Content store ready");

    let metadata: Arc<dyn MetadataStore> = Arc::new(
        GraphqlMetadataStore::new(
            config.graphql_endpoint.clone(),
            Duration::from_secs(config.metadata_timeout_secs),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize metadata client: {}", e))?,
    );
    tracing::info!(endpoint = %config.graphql_endpoint, "Metadata catalog client ready");

    let scanner = setup_scanner(config)?;

    let pipeline =
        ImagePipeline::new(config.image_workers).with_max_dimension(config.image_max_dimension);
    tracing::info!(
        workers = pipeline.workers(),
        max_dimension = pipeline.max_dimension(),
        "Image pipeline ready"
    );

    let files = FileService::new(
        metadata,
        content,
        scanner,
        pipeline,
        config.public_url.clone(),
        config.admin_secret.clone(),
    );

    Ok(Arc::new(AppState::new(config.clone(), files)))
}

#[cfg(feature = "clamav")]
fn setup_scanner(config: &Config) -> Result<Option<Arc<dyn VirusScanner>>> {
    if !config.clamav_enabled {
        tracing::info!("ClamAV scanning disabled");
        return Ok(None);
    }

    tracing::info!(
        host = %config.clamav_host,
        port = config.clamav_port,
        fail_closed = config.clamav_fail_closed,
        timeout_secs = config.clamav_timeout_secs,
        "ClamAV scanning enabled"
    );
    Ok(Some(Arc::new(ClamAVService::with_timeout(
        config.clamav_host.clone(),
        config.clamav_port,
        config.clamav_fail_closed,
        config.clamav_timeout_secs,
    ))))
}

#[cfg(not(feature = "clamav"))]
fn setup_scanner(config: &Config) -> Result<Option<Arc<dyn VirusScanner>>> {
    if config.clamav_enabled {
        anyhow::bail!("CLAMAV_ENABLED is set but the clamav feature is not compiled in");
    }
    Ok(None)
}
