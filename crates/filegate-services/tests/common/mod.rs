#![allow(dead_code)]

use filegate_core::{BucketPolicy, ForwardedHeaders};
use filegate_processing::ImagePipeline;
use filegate_services::test_helpers::{bucket, FlakyContentStore, MockMetadataStore, TEST_BUCKET};
use filegate_services::{FileService, UploadService, VirusScanner};
use filegate_storage::{ContentStore, LocalStorage};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_SECRET: &str = "test-admin-secret";

pub struct TestContext {
    pub metadata: MockMetadataStore,
    pub content: Arc<FlakyContentStore>,
    pub local: Arc<LocalStorage>,
    pub service: FileService,
    pub uploads: UploadService,
    pub headers: ForwardedHeaders,
    _dir: TempDir,
}

pub async fn context_with(
    bucket: BucketPolicy,
    scanner: Option<Arc<dyn VirusScanner>>,
) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let local = Arc::new(
        LocalStorage::new(dir.path().join("objects"), b"signing-key".to_vec())
            .await
            .unwrap(),
    );
    let content = Arc::new(FlakyContentStore::new(local.clone() as Arc<dyn ContentStore>));
    let metadata = MockMetadataStore::new().with_bucket(bucket);

    let service = FileService::new(
        Arc::new(metadata.clone()),
        content.clone(),
        scanner.clone(),
        ImagePipeline::new(2),
        "http://files.test",
        Some(ADMIN_SECRET.to_string()),
    );
    let uploads = UploadService::new(Arc::new(metadata.clone()), content.clone(), scanner);

    TestContext {
        metadata,
        content,
        local,
        service,
        uploads,
        headers: ForwardedHeaders::from_pairs(vec![("x-hasura-user-id", "user-1")]),
        _dir: dir,
    }
}

pub async fn context() -> TestContext {
    context_with(bucket(TEST_BUCKET), None).await
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([20, 120, 220, 255])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
