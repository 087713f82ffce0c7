//! Deterministic background removers for tests and benchmarks
//!
//! These never touch the network. [`FixtureRemover`] keeps a centered disk of
//! the input opaque and makes everything else transparent, which is enough to
//! exercise every downstream stage.

use super::BackgroundRemover;
use crate::{
    config::OutputFormat,
    error::{PfpError, Result},
    services::ImageIOService,
    types::RasterImage,
};
use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Fraction of the shorter side used as the radius of the kept disk
pub const FIXTURE_RADIUS_RATIO: f32 = 0.4;

/// Remover that keeps a centered disk of radius `0.4 * min(width, height)`
#[derive(Debug, Clone, Default)]
pub struct FixtureRemover {
    calls: Arc<AtomicUsize>,
}

impl FixtureRemover {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of images processed so far, shared between clones
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Apply the disk mask to a decoded image
    ///
    /// # Errors
    /// - `ExternalServiceFailure` if the masked raster cannot be rebuilt
    pub fn isolate(image: &RasterImage) -> Result<RasterImage> {
        let mut rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let radius = width.min(height) as f32 * FIXTURE_RADIUS_RATIO;
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;

        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            let dx = x as f32 + 0.5 - center_x;
            let dy = y as f32 + 0.5 - center_y;
            if (dx * dx + dy * dy).sqrt() > radius {
                pixel.0[3] = 0;
            }
        }

        RasterImage::from_raw(width, height, 4, rgba.into_raw())
            .map_err(|e| PfpError::external_service(format!("fixture mask failed: {}", e)))
    }
}

#[async_trait]
impl BackgroundRemover for FixtureRemover {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let decoded = ImageIOService::decode(image, None)
            .map_err(|e| PfpError::external_service(format!("fixture cannot read input: {}", e)))?;
        let isolated = Self::isolate(&decoded)?;
        ImageIOService::encode(&isolated, OutputFormat::Png, 100, false)
            .map_err(|e| PfpError::external_service(format!("fixture cannot encode: {}", e)))
    }
}

/// Remover that always fails with the given message
#[derive(Debug, Clone)]
pub struct FailingRemover {
    message: String,
}

impl FailingRemover {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingRemover {
    fn default() -> Self {
        Self::new("segmentation service unavailable")
    }
}

#[async_trait]
impl BackgroundRemover for FailingRemover {
    async fn remove_background(&self, _image: &[u8]) -> Result<Vec<u8>> {
        Err(PfpError::external_service(self.message.clone()))
    }
}

/// Remover that waits before answering like [`FixtureRemover`]
#[derive(Debug, Clone)]
pub struct SlowRemover {
    delay: Duration,
    inner: FixtureRemover,
}

impl SlowRemover {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: FixtureRemover::new(),
        }
    }
}

#[async_trait]
impl BackgroundRemover for SlowRemover {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove_background(image).await
    }
}

/// Remover that answers with bytes that are not an image
#[derive(Debug, Clone, Copy, Default)]
pub struct GarbageRemover;

#[async_trait]
impl BackgroundRemover for GarbageRemover {
    async fn remove_background(&self, _image: &[u8]) -> Result<Vec<u8>> {
        Ok(b"not an image".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RasterImage::from_raw(
            width,
            height,
            3,
            vec![90; (width * height * 3) as usize],
        )
        .unwrap();
        ImageIOService::encode(&image, OutputFormat::Png, 100, false).unwrap()
    }

    #[tokio::test]
    async fn test_fixture_keeps_center_disk() {
        let remover = FixtureRemover::new();
        let out = remover.remove_background(&png(100, 80)).await.unwrap();
        let decoded = ImageIOService::decode(&out, None).unwrap();

        assert_eq!(decoded.dimensions(), (100, 80));
        let rgba = decoded.to_rgba8();
        assert_eq!(rgba.get_pixel(50, 40).0, [90, 90, 90, 255]);
        assert_eq!(rgba.get_pixel(0, 0).0[3], 0);
        // radius is 0.4 * 80 = 32
        assert_eq!(rgba.get_pixel(50 + 30, 40).0[3], 255);
        assert_eq!(rgba.get_pixel(50 + 34, 40).0[3], 0);
        assert_eq!(remover.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fixture_is_deterministic() {
        let input = png(64, 64);
        let remover = FixtureRemover::new();
        let first = remover.remove_background(&input).await.unwrap();
        let second = remover.clone().remove_background(&input).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(remover.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_and_garbage_removers() {
        let err = FailingRemover::default()
            .remove_background(&png(4, 4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);

        let out = GarbageRemover.remove_background(&png(4, 4)).await.unwrap();
        assert!(ImageIOService::decode(&out, None).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_remover_waits() {
        let remover = SlowRemover::new(Duration::from_secs(60));
        let start = tokio::time::Instant::now();
        remover.remove_background(&png(8, 8)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
