use super::options::{DerivativeOptions, DEFAULT_MAX_DIMENSION};
use super::transform::transform;
use crate::buffer_pool::BufferPool;
use filegate_core::AppError;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;

/// Bounded image transformation pipeline.
///
/// At most `workers` transforms run at once; further callers wait for a
/// permit. Source bytes are read into buffers borrowed from a shared pool.
#[derive(Clone)]
pub struct ImagePipeline {
    permits: Arc<Semaphore>,
    buffers: BufferPool,
    workers: usize,
    max_dimension: u32,
}

impl ImagePipeline {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            buffers: BufferPool::new(workers),
            workers,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Cap on requested derivative width and height.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Permits not currently held by a running transform.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Copy `source` to `dest`, transforming it per `opts`.
    ///
    /// Empty options copy the bytes through unchanged without taking a
    /// permit. Returns the number of bytes written.
    pub async fn render<R, W>(
        &self,
        mut source: R,
        source_len: u64,
        dest: &mut W,
        opts: &DerivativeOptions,
    ) -> Result<u64, AppError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        if opts.is_empty() {
            let copied = tokio::io::copy(&mut source, dest).await?;
            return Ok(copied);
        }

        // Owned so it travels into the blocking task; dropped on every exit,
        // including when this future is cancelled mid-read.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("image pipeline is closed".to_string()))?;

        let start = Instant::now();
        let mut buffer = self.buffers.get();
        buffer.reserve(source_len as usize);
        source.read_to_end(&mut buffer).await?;

        let options = opts.clone();
        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            transform(&buffer, &options)
        })
        .await
        .map_err(|e| AppError::Internal(format!("image transform task failed: {}", e)))??;

        dest.write_all(&output).await?;
        dest.flush().await?;

        tracing::debug!(
            source_bytes = source_len,
            output_bytes = output.len(),
            width = opts.width,
            height = opts.height,
            target = opts.target_mime().unwrap_or_default(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image derivative rendered"
        );

        Ok(output.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OutputFormat;
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::time::Duration;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([50, 60, 70, 255])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[tokio::test]
    async fn test_empty_options_pass_through_unchanged() {
        let pipeline = ImagePipeline::new(2);
        let source = b"plain bytes, not an image".to_vec();
        let mut dest = Vec::new();

        let written = pipeline
            .render(
                source.as_slice(),
                source.len() as u64,
                &mut dest,
                &DerivativeOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(written, source.len() as u64);
        assert_eq!(dest, source);
        assert_eq!(pipeline.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_resize_writes_transformed_image() {
        let pipeline = ImagePipeline::new(1);
        let source = png(30, 10);
        let opts = DerivativeOptions {
            height: 5,
            source_format: Some(OutputFormat::Png),
            target_format: Some(OutputFormat::Png),
            ..Default::default()
        };
        let mut dest = Vec::new();

        pipeline
            .render(source.as_slice(), source.len() as u64, &mut dest, &opts)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&dest).unwrap();
        assert_eq!(decoded.dimensions(), (15, 5));
        assert_eq!(pipeline.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_when_cancelled() {
        let pipeline = ImagePipeline::new(1);
        // Writer half stays open, so the read never completes.
        let (_writer, reader) = tokio::io::duplex(64);
        let opts = DerivativeOptions {
            width: 10,
            source_format: Some(OutputFormat::Png),
            target_format: Some(OutputFormat::Png),
            ..Default::default()
        };
        let mut dest = Vec::new();

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            pipeline.render(reader, 0, &mut dest, &opts),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(pipeline.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_failed_transform_releases_permit() {
        let pipeline = ImagePipeline::new(1);
        let source = b"broken".to_vec();
        let opts = DerivativeOptions {
            width: 10,
            source_format: Some(OutputFormat::Jpeg),
            target_format: Some(OutputFormat::Jpeg),
            ..Default::default()
        };
        let mut dest = Vec::new();

        let err = pipeline
            .render(source.as_slice(), source.len() as u64, &mut dest, &opts)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ImageProcessing(_)));
        assert!(dest.is_empty());
        assert_eq!(pipeline.available_permits(), 1);
    }
}
