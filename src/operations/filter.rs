//! Stylistic filter presets

use super::color::{self, PixelOp};
use crate::{
    error::{ErrorKind, PfpError, Result},
    types::RasterImage,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed set of named filter presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    None,
    Professional,
    Vintage,
    Dramatic,
    Soft,
    BlackWhite,
    Warm,
    Cool,
}

/// One step of a preset recipe
enum Step {
    Color(Vec<PixelOp>),
    Blur(f32),
    Sharpen(f32),
}

impl FilterPreset {
    pub const ALL: [FilterPreset; 8] = [
        Self::None,
        Self::Professional,
        Self::Vintage,
        Self::Dramatic,
        Self::Soft,
        Self::BlackWhite,
        Self::Warm,
        Self::Cool,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Professional => "professional",
            Self::Vintage => "vintage",
            Self::Dramatic => "dramatic",
            Self::Soft => "soft",
            Self::BlackWhite => "blackwhite",
            Self::Warm => "warm",
            Self::Cool => "cool",
        }
    }

    fn recipe(self) -> Vec<Step> {
        match self {
            Self::None => Vec::new(),
            Self::Professional => vec![
                Step::Color(vec![PixelOp::Lightness(1.05), PixelOp::Saturation(0.95)]),
                Step::Sharpen(0.5),
            ],
            Self::Vintage => vec![Step::Color(vec![
                PixelOp::Lightness(0.9),
                PixelOp::Saturation(0.8),
                PixelOp::HueRotate(20.0),
                PixelOp::Tint([255, 220, 177]),
            ])],
            Self::Dramatic => vec![Step::Color(vec![
                PixelOp::Lightness(0.95),
                PixelOp::Saturation(1.2),
                PixelOp::Linear { a: 1.2, b: -25.0 },
            ])],
            Self::Soft => vec![
                Step::Color(vec![PixelOp::Lightness(1.1), PixelOp::Saturation(0.85)]),
                Step::Blur(0.3),
            ],
            Self::BlackWhite => vec![Step::Color(vec![PixelOp::Greyscale])],
            Self::Warm => vec![Step::Color(vec![PixelOp::Tint([255, 230, 200])])],
            Self::Cool => vec![Step::Color(vec![PixelOp::Tint([200, 230, 255])])],
        }
    }
}

impl std::fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterPreset {
    type Err = PfpError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == normalized)
            .ok_or_else(|| {
                let accepted: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                PfpError::unknown_variant(ErrorKind::UnknownFilter, s, &accepted)
            })
    }
}

/// Apply a preset's fixed recipe
///
/// `FilterPreset::None` returns a pixel-identical copy. Alpha is preserved.
///
/// # Errors
/// - Only internal buffer failures; every preset is total over valid rasters
pub fn apply_filter(image: &RasterImage, preset: FilterPreset) -> Result<RasterImage> {
    let mut out = image.clone();
    for step in preset.recipe() {
        out = match step {
            Step::Color(ops) => color::map_pixels(&out, &ops)?,
            Step::Blur(sigma) => color::gaussian_blur(&out, sigma)?,
            Step::Sharpen(sigma) => color::unsharp(&out, sigma)?,
        };
    }
    Ok(out)
}

/// Parse a preset name, then apply it
///
/// # Errors
/// - `UnknownFilter` for any name outside the closed preset set
pub fn apply_named_filter(image: &RasterImage, name: &str) -> Result<RasterImage> {
    let preset = name.parse::<FilterPreset>()?;
    apply_filter(image, preset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RasterImage {
        let mut data = Vec::new();
        for i in 0..64u32 {
            data.extend_from_slice(&[
                (i * 4) as u8,
                (255 - i * 3) as u8,
                (i * 2 + 40) as u8,
                (i * 4 + 3) as u8,
            ]);
        }
        RasterImage::from_raw(8, 8, 4, data).unwrap()
    }

    fn channel_mean(image: &RasterImage, channel: usize) -> f64 {
        let step = usize::from(image.channels());
        let values: Vec<f64> = image
            .as_bytes()
            .iter()
            .skip(channel)
            .step_by(step)
            .map(|&v| f64::from(v))
            .collect();
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_none_is_pixel_identical() {
        let image = sample();
        assert_eq!(apply_filter(&image, FilterPreset::None).unwrap(), image);
    }

    #[test]
    fn test_every_preset_preserves_alpha_and_size() {
        let image = sample();
        for preset in FilterPreset::ALL {
            let out = apply_filter(&image, preset).unwrap();
            assert_eq!(out.dimensions(), image.dimensions(), "{}", preset);
            assert_eq!(out.alpha_channel(), image.alpha_channel(), "{}", preset);
        }
    }

    #[test]
    fn test_blackwhite_has_equal_channels() {
        let out = apply_filter(&sample(), FilterPreset::BlackWhite).unwrap();
        for pixel in out.as_bytes().chunks_exact(4) {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[test]
    fn test_warm_and_cool_shift_balance() {
        let image = sample();
        let warm = apply_filter(&image, FilterPreset::Warm).unwrap();
        let cool = apply_filter(&image, FilterPreset::Cool).unwrap();

        let warm_balance = channel_mean(&warm, 0) - channel_mean(&warm, 2);
        let cool_balance = channel_mean(&cool, 0) - channel_mean(&cool, 2);
        let base_balance = channel_mean(&image, 0) - channel_mean(&image, 2);
        assert!(warm_balance > base_balance);
        assert!(cool_balance < base_balance);
    }

    #[test]
    fn test_filters_are_deterministic() {
        let image = sample();
        for preset in FilterPreset::ALL {
            let a = apply_filter(&image, preset).unwrap();
            let b = apply_filter(&image, preset).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_named_filter_parsing() {
        assert_eq!(
            "blackwhite".parse::<FilterPreset>().unwrap(),
            FilterPreset::BlackWhite
        );
        assert_eq!("Warm".parse::<FilterPreset>().unwrap(), FilterPreset::Warm);

        let err = apply_named_filter(&sample(), "rainbow").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFilter);
        assert!(err.to_string().contains("rainbow"));
    }
}
