//! Image I/O service
//!
//! In-memory decoding and encoding. Each call owns its own codec state.
//! ICC profiles are read at decode time and re-embedded at encode time.

use crate::{
    config::OutputFormat,
    error::{PfpError, Result},
    services::OutputFormatHandler,
    types::{ColorProfile, RasterImage},
};
use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    imageops::FilterType,
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader,
};
use std::io::Cursor;

/// Service for decoding and encoding rasters
pub struct ImageIOService;

impl ImageIOService {
    /// Decode image bytes, guessing the format from content
    ///
    /// Any pixel layout is normalized to 8-bit RGB or RGBA. When
    /// `max_dimension` is set, larger images are downscaled proportionally so
    /// that neither side exceeds it.
    ///
    /// # Errors
    /// - `DecodeFailure` for empty, truncated or unsupported data
    pub fn decode(bytes: &[u8], max_dimension: Option<u32>) -> Result<RasterImage> {
        if bytes.is_empty() {
            return Err(PfpError::decode("empty image data"));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PfpError::decode(format!("failed to read image header: {}", e)))?;
        let format = reader.format();
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| PfpError::decode(format!("unsupported image data: {}", e)))?;

        let color_profile = match decoder.icc_profile() {
            Ok(Some(icc_data)) => {
                log::debug!("Extracted ICC profile ({} bytes)", icc_data.len());
                Some(ColorProfile::from_icc_data(icc_data))
            },
            Ok(None) => None,
            Err(e) => {
                log::debug!("Failed to extract ICC profile: {}", e);
                None
            },
        };

        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| PfpError::decode(format!("failed to decode image: {}", e)))?;
        log::debug!(
            "Decoded {:?} image {}x{} ({:?})",
            format,
            image.width(),
            image.height(),
            image.color()
        );

        if let Some(limit) = max_dimension {
            if image.width() > limit || image.height() > limit {
                log::info!(
                    "Downscaling {}x{} source to fit within {}px",
                    image.width(),
                    image.height(),
                    limit
                );
                image = image.resize(limit, limit, FilterType::Lanczos3);
            }
        }

        Ok(RasterImage::from_dynamic(image)
            .map_err(|e| PfpError::decode(e.to_string()))?
            .with_color_profile(color_profile))
    }

    /// Encode a raster in the requested format
    ///
    /// `quality` applies to JPEG; WebP is always written losslessly. The
    /// raster's color profile is embedded when `embed_profile` is set.
    ///
    /// # Errors
    /// - `EncodeFailure` when the encoder rejects the image
    pub fn encode(
        image: &RasterImage,
        format: OutputFormat,
        quality: u8,
        embed_profile: bool,
    ) -> Result<Vec<u8>> {
        OutputFormatHandler::validate_for_transparency(image, format);
        let prepared = OutputFormatHandler::convert_format(image, format);
        let icc = image
            .color_profile()
            .filter(|_| embed_profile)
            .map(|profile| profile.icc_data.clone());

        let (width, height) = (prepared.width(), prepared.height());
        let color_type = if prepared.color().has_alpha() {
            ExtendedColorType::Rgba8
        } else {
            ExtendedColorType::Rgb8
        };

        let mut buffer = Vec::new();
        match format {
            OutputFormat::Png => {
                let mut encoder = PngEncoder::new(&mut buffer);
                attach_profile(&mut encoder, icc, "PNG");
                encoder.write_image(prepared.as_bytes(), width, height, color_type)
            },
            OutputFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
                attach_profile(&mut encoder, icc, "JPEG");
                encoder.write_image(prepared.as_bytes(), width, height, color_type)
            },
            #[cfg(feature = "webp-support")]
            OutputFormat::WebP => {
                let mut encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buffer);
                attach_profile(&mut encoder, icc, "WebP");
                encoder.write_image(prepared.as_bytes(), width, height, color_type)
            },
            #[cfg(not(feature = "webp-support"))]
            OutputFormat::WebP => {
                return Err(PfpError::encode(
                    "WebP output requires the webp-support feature",
                ))
            },
        }
        .map_err(|e| PfpError::encode(format!("failed to encode {:?}: {}", format, e)))?;

        Ok(buffer)
    }
}

fn attach_profile<E: ImageEncoder>(encoder: &mut E, icc: Option<Vec<u8>>, format_name: &str) {
    let Some(icc_data) = icc else {
        return;
    };
    let size = icc_data.len();
    if let Err(e) = encoder.set_icc_profile(icc_data) {
        log::debug!("Failed to embed ICC profile in {}: {}", format_name, e);
    } else {
        log::debug!("Embedded ICC profile in {} output ({} bytes)", format_name, size);
    }
}
