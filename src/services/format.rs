//! Output format handling service
//!
//! Keeps format-specific decisions such as file extensions and alpha
//! flattening out of the pipeline.

use crate::{
    config::OutputFormat,
    error::{PfpError, Result},
    types::RasterImage,
};
use image::{DynamicImage, Rgb, RgbImage};

/// Service for output format decisions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Prepare a raster for encoding in the given format
    ///
    /// Formats without an alpha channel get the image flattened onto white.
    #[must_use]
    pub fn convert_format(image: &RasterImage, format: OutputFormat) -> DynamicImage {
        if Self::supports_transparency(format) || !image.has_alpha() {
            return image.as_dynamic().clone();
        }

        let rgba = image.to_rgba8();
        let mut flattened = RgbImage::new(rgba.width(), rgba.height());
        for (out, pixel) in flattened.pixels_mut().zip(rgba.pixels()) {
            let alpha = u32::from(pixel[3]);
            let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            *out = Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]);
        }
        DynamicImage::ImageRgb8(flattened)
    }

    /// File extension (without the dot)
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// Infer the format from a file extension
    ///
    /// # Errors
    /// - `InvalidInput` for extensions with no matching output format
    pub fn from_extension(extension: &str) -> Result<OutputFormat> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(PfpError::invalid_input(format!(
                "no output format for extension '{}'",
                other
            ))),
        }
    }

    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Warn when a transparent result is about to lose its alpha
    pub fn validate_for_transparency(image: &RasterImage, format: OutputFormat) {
        if image.has_alpha() && !Self::supports_transparency(format) {
            log::warn!(
                "Output format {:?} does not support transparency; flattening onto white",
                format
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_format_flattens_for_jpeg() {
        let image = RasterImage::from_raw(2, 1, 4, vec![255, 0, 0, 255, 0, 0, 0, 0]).unwrap();
        let converted = OutputFormatHandler::convert_format(&image, OutputFormat::Jpeg);

        match converted {
            DynamicImage::ImageRgb8(rgb) => {
                assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
                assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 255, 255]));
            },
            _ => panic!("Expected RGB8 image for JPEG format"),
        }

        let kept = OutputFormatHandler::convert_format(&image, OutputFormat::Png);
        assert!(kept.color().has_alpha());
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
        assert_eq!(
            OutputFormatHandler::get_extension(OutputFormat::Jpeg),
            "jpg"
        );
        assert_eq!(
            OutputFormatHandler::get_extension(OutputFormat::WebP),
            "webp"
        );
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(
            OutputFormatHandler::from_extension("JPEG").unwrap(),
            OutputFormat::Jpeg
        );
        assert_eq!(
            OutputFormatHandler::from_extension(".png").unwrap(),
            OutputFormat::Png
        );
        assert!(OutputFormatHandler::from_extension("gif").is_err());
    }

    #[test]
    fn test_supports_transparency() {
        assert!(OutputFormatHandler::supports_transparency(
            OutputFormat::Png
        ));
        assert!(OutputFormatHandler::supports_transparency(
            OutputFormat::WebP
        ));
        assert!(!OutputFormatHandler::supports_transparency(
            OutputFormat::Jpeg
        ));
    }
}
