//! Shape cropping

use super::{
    color,
    mask::{generate_mask, Shape},
};
use crate::{
    error::Result,
    types::RasterImage,
    utils::NumericValidator,
};
use serde::{Deserialize, Serialize};

/// Crop shape and requested side length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSpec {
    pub shape: Shape,
    pub size: u32,
}

impl ShapeSpec {
    /// # Errors
    /// - `InvalidInput` when `size` is zero
    pub fn new(shape: Shape, size: u32) -> Result<Self> {
        let spec = Self { shape, size };
        spec.validate()?;
        Ok(spec)
    }

    /// # Errors
    /// - `InvalidInput` when `size` is zero
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_positive(self.size, "shape size")?;
        Ok(())
    }

    /// Side length actually produced for an image of the given dimensions
    ///
    /// Never upscales beyond either native axis and never exceeds the request.
    #[must_use]
    pub fn working_size(&self, (width, height): (u32, u32)) -> u32 {
        width.min(height).min(self.size)
    }
}

/// Cover-fit the image to a square and cut it to the shape
///
/// The result is always RGBA. Pixels outside the shape are fully
/// transparent with zeroed color.
///
/// # Errors
/// - `InvalidInput` when `spec.size` is zero
pub fn crop_to_shape(image: &RasterImage, spec: &ShapeSpec) -> Result<RasterImage> {
    spec.validate()?;
    let size = spec.working_size(image.dimensions());

    let mut square = if image.dimensions() == (size, size) {
        image.to_rgba8()
    } else {
        color::resize_to_fill(image, size, size)?.into_rgba8()
    };

    let mask = generate_mask(spec.shape, size)?;
    for (pixel, coverage) in square.pixels_mut().zip(mask.alpha_channel()) {
        let alpha = (u16::from(pixel[3]) * u16::from(coverage) + 127) / 255;
        pixel[3] = alpha as u8;
        if alpha == 0 {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
        }
    }

    Ok(RasterImage::from_rgba8(square).with_color_profile(image.color_profile().cloned()))
}
