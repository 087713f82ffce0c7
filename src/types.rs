//! Core types for pipeline operations

use crate::{
    config::OutputFormat,
    error::{PfpError, Result},
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Embedded ICC color profile carried alongside a raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProfile {
    pub icc_data: Vec<u8>,
}

impl ColorProfile {
    #[must_use]
    pub fn from_icc_data(icc_data: Vec<u8>) -> Self {
        Self { icc_data }
    }

    #[must_use]
    pub fn data_size(&self) -> usize {
        self.icc_data.len()
    }

    /// Data color space signature from the ICC header (bytes 16..20), e.g. `RGB` or `GRAY`
    #[must_use]
    pub fn color_space(&self) -> String {
        self.icc_data
            .get(16..20)
            .map(|sig| String::from_utf8_lossy(sig).trim().to_string())
            .filter(|sig| !sig.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// In-memory decoded bitmap, always 8-bit RGB or RGBA
///
/// Every pipeline stage consumes one `RasterImage` and produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: DynamicImage,
    color_profile: Option<ColorProfile>,
}

impl RasterImage {
    /// Build a raster from a raw interleaved buffer
    ///
    /// # Errors
    /// - Zero width or height
    /// - Channel count other than 3 or 4
    /// - Buffer length not equal to `width * height * channels`
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PfpError::invalid_input(format!(
                "raster dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * usize::from(channels);
        if data.len() != expected {
            return Err(PfpError::invalid_input(format!(
                "buffer length {} does not match {}x{}x{} = {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }

        let pixels = match channels {
            3 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
            other => {
                return Err(PfpError::invalid_input(format!(
                    "channel count must be 3 or 4, got {}",
                    other
                )))
            },
        }
        .ok_or_else(|| PfpError::internal("pixel buffer rejected by image container"))?;

        Ok(Self {
            pixels,
            color_profile: None,
        })
    }

    /// Normalize any decoded image into an 8-bit RGB or RGBA raster
    ///
    /// # Errors
    /// - Zero width or height
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PfpError::invalid_input(format!(
                "raster dimensions must be positive, got {}x{}",
                width, height
            )));
        }

        let pixels = match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        Ok(Self {
            pixels,
            color_profile: None,
        })
    }

    /// Wrap a stage output; stages never produce empty buffers
    pub(crate) fn from_rgba8(image: RgbaImage) -> Self {
        debug_assert!(image.width() > 0 && image.height() > 0);
        Self {
            pixels: DynamicImage::ImageRgba8(image),
            color_profile: None,
        }
    }

    /// Attach an embedded color profile
    #[must_use]
    pub fn with_color_profile(mut self, profile: Option<ColorProfile>) -> Self {
        self.color_profile = profile;
        self
    }

    #[must_use]
    pub fn color_profile(&self) -> Option<&ColorProfile> {
        self.color_profile.as_ref()
    }

    pub(crate) fn take_color_profile(&mut self) -> Option<ColorProfile> {
        self.color_profile.take()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Number of interleaved channels (3 or 4)
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.pixels.color().channel_count()
    }

    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.pixels.color().has_alpha()
    }

    /// Raw interleaved pixel bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_bytes()
    }

    #[must_use]
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.pixels
    }

    /// RGBA copy of the pixels; RGB sources become fully opaque
    #[must_use]
    pub fn to_rgba8(&self) -> RgbaImage {
        self.pixels.to_rgba8()
    }

    #[must_use]
    pub fn into_rgba8(self) -> RgbaImage {
        match self.pixels {
            DynamicImage::ImageRgba8(rgba) => rgba,
            other => other.to_rgba8(),
        }
    }

    /// Alpha plane in row-major order; 255 everywhere for RGB rasters
    #[must_use]
    pub fn alpha_channel(&self) -> Vec<u8> {
        match &self.pixels {
            DynamicImage::ImageRgba8(rgba) => rgba.pixels().map(|p| p[3]).collect(),
            other => vec![255; other.width() as usize * other.height() as usize],
        }
    }
}

/// Target width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Timing of one executed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Operation index, `None` for decode/encode
    pub index: Option<usize>,
    pub name: String,
    pub duration_ms: u64,
}

/// Metadata describing one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub started_at: DateTime<Utc>,
    pub total_ms: u64,
    pub stages: Vec<StageTiming>,
    pub operation_count: usize,
    /// Hex SHA-256 of the encoded output
    pub content_digest: String,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            total_ms: 0,
            stages: Vec::new(),
            operation_count: 0,
            content_digest: String::new(),
        }
    }

    pub fn record_stage(&mut self, index: Option<usize>, name: &str, duration_ms: u64) {
        self.stages.push(StageTiming {
            index,
            name: name.to_string(),
            duration_ms,
        });
    }

    /// Human-readable timing breakdown
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let mut summary = format!("Total: {}ms", self.total_ms);
        for stage in &self.stages {
            match stage.index {
                Some(index) => summary.push_str(&format!(
                    " | #{} {}: {}ms",
                    index, stage.name, stage.duration_ms
                )),
                None => summary.push_str(&format!(" | {}: {}ms", stage.name, stage.duration_ms)),
            }
        }
        summary
    }
}

/// Final encoded output of a pipeline invocation
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub dimensions: Dimensions,
    pub metadata: ProcessingMetadata,
}

impl ProcessedImage {
    /// Wrap encoded bytes, stamping the content digest into the metadata
    #[must_use]
    pub fn new(
        bytes: Vec<u8>,
        format: OutputFormat,
        dimensions: Dimensions,
        mut metadata: ProcessingMetadata,
    ) -> Self {
        metadata.content_digest = content_digest(&bytes);
        Self {
            bytes,
            format,
            dimensions,
            metadata,
        }
    }

    #[must_use]
    pub fn digest(&self) -> &str {
        &self.metadata.content_digest
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Hex-encoded SHA-256 of a byte slice
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}
