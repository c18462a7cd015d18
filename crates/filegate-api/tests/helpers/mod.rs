//! Test helpers: build the router over in-memory collaborators.
//!
//! The metadata catalog is the mock from `filegate_services::test_helpers`;
//! content lives in a local store under a temporary directory.

#![allow(dead_code)]

use axum_test::TestServer;
use filegate_api::setup::routes::setup_routes;
use filegate_api::AppState;
use filegate_core::{BucketPolicy, Config, StorageBackend};
use filegate_processing::ImagePipeline;
use filegate_services::test_helpers::{bucket, MockMetadataStore, TEST_BUCKET};
use filegate_services::{FileService, VirusScanner};
use filegate_storage::LocalStorage;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_SECRET: &str = "test-admin-secret";
pub const PUBLIC_URL: &str = "http://files.test";

pub struct TestApp {
    pub server: TestServer,
    pub metadata: MockMetadataStore,
    pub local: Arc<LocalStorage>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_config(storage_path: &str) -> Config {
    Config {
        server_port: 8000,
        public_url: PUBLIC_URL.to_string(),
        environment: "test".to_string(),
        log_format: "text".to_string(),
        cors_origins: vec!["*".to_string()],
        max_request_size_mb: 10,
        graphql_endpoint: "http://localhost:8080/v1/graphql".to_string(),
        admin_secret: Some(ADMIN_SECRET.to_string()),
        metadata_timeout_secs: 5,
        storage_backend: StorageBackend::Local,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        local_storage_path: Some(storage_path.to_string()),
        presign_secret: Some("presign-secret".to_string()),
        clamav_enabled: false,
        clamav_host: "localhost".to_string(),
        clamav_port: 3310,
        clamav_fail_closed: true,
        clamav_timeout_secs: 5,
        image_workers: 2,
        image_max_dimension: 4096,
    }
}

pub async fn setup_test_app_with(
    policy: BucketPolicy,
    scanner: Option<Arc<dyn VirusScanner>>,
) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage_path = temp_dir.path().join("objects");
    let config = test_config(&storage_path.to_string_lossy());

    let local = Arc::new(
        LocalStorage::new(storage_path, b"presign-secret".to_vec())
            .await
            .expect("Failed to create local storage"),
    );
    let metadata = MockMetadataStore::new().with_bucket(policy);

    let files = FileService::new(
        Arc::new(metadata.clone()),
        local.clone(),
        scanner,
        ImagePipeline::new(config.image_workers).with_max_dimension(config.image_max_dimension),
        config.public_url.clone(),
        config.admin_secret.clone(),
    );
    let state = Arc::new(AppState::new(config, files));
    let server = TestServer::new(setup_routes(state)).expect("Failed to start test server");

    TestApp {
        server,
        metadata,
        local,
        _temp_dir: temp_dir,
    }
}

/// Default bucket, no scanner.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(bucket(TEST_BUCKET), None).await
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("Failed to encode PNG");
    out
}
