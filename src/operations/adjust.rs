//! Color adjustment stage

use super::color::{self, PixelOp};
use crate::{error::Result, types::RasterImage, utils::NumericValidator};
use serde::{Deserialize, Serialize};

/// Optional adjustment knobs; absent fields are no-ops
///
/// Brightness, contrast and saturation are percentages in `-100..=100`,
/// hue is in degrees, blur and sharpening are Gaussian sigmas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Adjustment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpening: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f32>,
}

impl Adjustment {
    #[must_use]
    pub fn builder() -> AdjustmentBuilder {
        AdjustmentBuilder::default()
    }

    /// Check every present field against its domain
    ///
    /// # Errors
    /// - `InvalidInput` naming the first out-of-domain field
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
        ] {
            if let Some(value) = value {
                NumericValidator::validate_range(value, -100.0, 100.0, name)?;
            }
        }
        if let Some(hue) = self.hue {
            NumericValidator::validate_finite(hue, "hue")?;
        }
        if let Some(sharpening) = self.sharpening {
            NumericValidator::validate_sigma(sharpening, "sharpening")?;
        }
        if let Some(blur) = self.blur {
            NumericValidator::validate_sigma(blur, "blur")?;
        }
        if let Some(gamma) = self.gamma {
            NumericValidator::validate_finite(gamma, "gamma")?;
            NumericValidator::validate_positive(gamma, "gamma")?;
        }
        Ok(())
    }

    /// True when no field would change any pixel
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.color_ops().is_empty()
            && self.blur.map_or(true, |b| b <= 0.0)
            && self.sharpening.map_or(true, |s| s <= 0.0)
    }

    /// Color-space passes in application order
    fn color_ops(&self) -> Vec<PixelOp> {
        let mut ops = Vec::new();
        if let Some(brightness) = self.brightness {
            ops.push(PixelOp::Lightness(1.0 + brightness / 100.0));
        }
        if let Some(contrast) = self.contrast {
            ops.push(PixelOp::contrast(contrast));
        }
        if let Some(saturation) = self.saturation {
            ops.push(PixelOp::Saturation(1.0 + saturation / 100.0));
        }
        if let Some(hue) = self.hue {
            ops.push(PixelOp::HueRotate(hue));
        }
        if let Some(gamma) = self.gamma {
            ops.push(PixelOp::Gamma(gamma));
        }
        ops
    }
}

/// Builder for `Adjustment`
#[derive(Debug, Default)]
pub struct AdjustmentBuilder {
    adjustment: Adjustment,
}

impl AdjustmentBuilder {
    #[must_use]
    pub fn brightness(mut self, value: f32) -> Self {
        self.adjustment.brightness = Some(value);
        self
    }

    #[must_use]
    pub fn contrast(mut self, value: f32) -> Self {
        self.adjustment.contrast = Some(value);
        self
    }

    #[must_use]
    pub fn saturation(mut self, value: f32) -> Self {
        self.adjustment.saturation = Some(value);
        self
    }

    #[must_use]
    pub fn hue(mut self, degrees: f32) -> Self {
        self.adjustment.hue = Some(degrees);
        self
    }

    #[must_use]
    pub fn sharpening(mut self, sigma: f32) -> Self {
        self.adjustment.sharpening = Some(sigma);
        self
    }

    #[must_use]
    pub fn blur(mut self, sigma: f32) -> Self {
        self.adjustment.blur = Some(sigma);
        self
    }

    #[must_use]
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.adjustment.gamma = Some(gamma);
        self
    }

    /// Validate and build the adjustment
    ///
    /// # Errors
    /// - `InvalidInput` for any out-of-domain field
    pub fn build(self) -> Result<Adjustment> {
        self.adjustment.validate()?;
        Ok(self.adjustment)
    }
}

/// Apply brightness, contrast, saturation, hue, gamma, blur and sharpening in that order
///
/// The adjustment is validated before any pixel is read. Alpha is preserved
/// byte-for-byte and the channel layout of the input is kept.
///
/// # Errors
/// - `InvalidInput` for any out-of-domain field
pub fn adjust(image: &RasterImage, adjustment: &Adjustment) -> Result<RasterImage> {
    adjustment.validate()?;
    if adjustment.is_identity() {
        return Ok(image.clone());
    }

    let mut out = color::map_pixels(image, &adjustment.color_ops())?;
    if let Some(sigma) = adjustment.blur {
        out = color::gaussian_blur(&out, sigma)?;
    }
    if let Some(sharpening) = adjustment.sharpening {
        out = color::unsharp(&out, sharpening / 2.0)?;
    }
    Ok(out)
}
