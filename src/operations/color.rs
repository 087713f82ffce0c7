//! Shared per-pixel color math
//!
//! Channels are converted to `f32` in `0.0..=1.0`, run through a list of
//! [`PixelOp`]s and quantized back to `u8` exactly once. Alpha is never touched
//! by the color passes; the convolution passes restore it afterwards.

use crate::{error::Result, types::RasterImage};
use image::{imageops, imageops::FilterType, DynamicImage, RgbaImage};

/// Rec. 709 luma coefficients
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Weight of the multiplicative tint blend
const TINT_WEIGHT: f32 = 0.5;

/// A single color-space transform applied to the RGB channels of a pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PixelOp {
    /// Multiply HSL lightness
    Lightness(f32),
    /// Multiply HSL saturation
    Saturation(f32),
    /// Rotate HSL hue by degrees
    HueRotate(f32),
    /// `out = a * in + b` on the 0..255 scale
    Linear { a: f32, b: f32 },
    /// `out = in ^ (1 / gamma)`
    Gamma(f32),
    /// Multiplicative blend toward an RGB target, luminance preserving
    Tint([u8; 3]),
    /// Rec. 709 greyscale with R = G = B
    Greyscale,
}

impl PixelOp {
    /// Contrast as the classic `259 * (c + 255) / (255 * (259 - c))` linear map around mid-grey
    pub(crate) fn contrast(amount: f32) -> Self {
        let factor = (259.0 * (amount + 255.0)) / (255.0 * (259.0 - amount));
        Self::Linear {
            a: factor,
            b: 128.0 - 128.0 * factor,
        }
    }

    fn apply(self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            Self::Lightness(factor) => {
                let (h, s, l) = rgb_to_hsl(rgb);
                hsl_to_rgb(h, s, (l * factor).clamp(0.0, 1.0))
            },
            Self::Saturation(factor) => {
                let (h, s, l) = rgb_to_hsl(rgb);
                hsl_to_rgb(h, (s * factor).clamp(0.0, 1.0), l)
            },
            Self::HueRotate(degrees) => {
                let (h, s, l) = rgb_to_hsl(rgb);
                hsl_to_rgb((h + degrees).rem_euclid(360.0), s, l)
            },
            Self::Linear { a, b } => rgb.map(|c| (a * c + b / 255.0).clamp(0.0, 1.0)),
            Self::Gamma(gamma) => rgb.map(|c| c.clamp(0.0, 1.0).powf(1.0 / gamma)),
            Self::Tint(target) => tint(rgb, target),
            Self::Greyscale => {
                let y = luma(rgb).clamp(0.0, 1.0);
                [y, y, y]
            },
        }
    }
}

fn luma([r, g, b]: [f32; 3]) -> f32 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

fn tint(rgb: [f32; 3], target: [u8; 3]) -> [f32; 3] {
    let before = luma(rgb);
    let mut tinted = [0.0; 3];
    for ((out, &c), &t) in tinted.iter_mut().zip(rgb.iter()).zip(target.iter()) {
        *out = c * (1.0 - TINT_WEIGHT + TINT_WEIGHT * f32::from(t) / 255.0);
    }
    let after = luma(tinted);
    if after > f32::EPSILON {
        let scale = before / after;
        tinted = tinted.map(|c| (c * scale).clamp(0.0, 1.0));
    }
    tinted
}

/// Convert normalized RGB to (hue degrees, saturation, lightness)
pub(crate) fn rgb_to_hsl([r, g, b]: [f32; 3]) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta <= f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let h = if (max - r).abs() <= f32::EPSILON {
        ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() <= f32::EPSILON {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert (hue degrees, saturation, lightness) to normalized RGB
pub(crate) fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s <= f32::EPSILON {
        return [l, l, l];
    }

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    [r1 + m, g1 + m, b1 + m]
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Run the color ops over every pixel, preserving channel layout and alpha
pub(crate) fn map_pixels(image: &RasterImage, ops: &[PixelOp]) -> Result<RasterImage> {
    if ops.is_empty() {
        return Ok(image.clone());
    }

    let channels = usize::from(image.channels());
    let mut data = image.as_bytes().to_vec();
    for pixel in data.chunks_exact_mut(channels) {
        let mut rgb = [
            f32::from(pixel[0]) / 255.0,
            f32::from(pixel[1]) / 255.0,
            f32::from(pixel[2]) / 255.0,
        ];
        for op in ops {
            rgb = op.apply(rgb);
        }
        pixel[0] = quantize(rgb[0]);
        pixel[1] = quantize(rgb[1]);
        pixel[2] = quantize(rgb[2]);
    }

    rebuild(image, data)
}

/// Gaussian blur with the given sigma
///
/// Zero, negative and subnormal sigmas are a no-op.
pub(crate) fn gaussian_blur(image: &RasterImage, sigma: f32) -> Result<RasterImage> {
    if !is_kernel_sigma(sigma) {
        return Ok(image.clone());
    }
    let blurred = premultiplied(image, |rgba| imageops::blur(&rgba, sigma));
    restore_alpha(image, blurred)
}

/// Unsharp mask with the given sigma and zero threshold
///
/// Zero, negative and subnormal sigmas are a no-op.
pub(crate) fn unsharp(image: &RasterImage, sigma: f32) -> Result<RasterImage> {
    if !is_kernel_sigma(sigma) {
        return Ok(image.clone());
    }
    let sharpened = premultiplied(image, |rgba| imageops::unsharpen(&rgba, sigma, 0));
    restore_alpha(image, sharpened)
}

/// `imageops` kernels assert a normal, positive sigma
fn is_kernel_sigma(sigma: f32) -> bool {
    sigma.is_normal() && sigma > 0.0
}

/// Lanczos3 resize-and-crop to exactly `width` x `height`
///
/// Images with alpha are resampled premultiplied so transparent pixels do not
/// bleed their color into visible edges. The channel layout and color profile
/// of the input are kept.
pub(crate) fn resize_to_fill(image: &RasterImage, width: u32, height: u32) -> Result<RasterImage> {
    let resized = if image.has_alpha() {
        let rgba = premultiplied(image, |rgba| {
            DynamicImage::ImageRgba8(rgba)
                .resize_to_fill(width, height, FilterType::Lanczos3)
                .to_rgba8()
        });
        RasterImage::from_rgba8(rgba)
    } else {
        RasterImage::from_dynamic(image.as_dynamic().resize_to_fill(
            width,
            height,
            FilterType::Lanczos3,
        ))?
    };
    Ok(resized.with_color_profile(image.color_profile().cloned()))
}

/// Run `kernel` on premultiplied RGBA and return straight RGBA
fn premultiplied<F>(image: &RasterImage, kernel: F) -> RgbaImage
where
    F: FnOnce(RgbaImage) -> RgbaImage,
{
    let mut rgba = image.to_rgba8();
    if !image.has_alpha() {
        return kernel(rgba);
    }
    for pixel in rgba.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        for channel in pixel.0.iter_mut().take(3) {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }

    let mut out = kernel(rgba);
    for pixel in out.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        for channel in pixel.0.iter_mut().take(3) {
            *channel = if alpha == 0 {
                0
            } else {
                ((u16::from(*channel) * 255 + alpha / 2) / alpha).min(255) as u8
            };
        }
    }
    out
}

fn restore_alpha(original: &RasterImage, mut filtered: RgbaImage) -> Result<RasterImage> {
    for (pixel, alpha) in filtered.pixels_mut().zip(original.alpha_channel()) {
        pixel[3] = alpha;
    }
    let data = if original.has_alpha() {
        filtered.into_raw()
    } else {
        DynamicImage::ImageRgba8(filtered).to_rgb8().into_raw()
    };
    rebuild(original, data)
}

/// Rewrap a buffer with the layout and color profile of `original`
pub(crate) fn rebuild(original: &RasterImage, data: Vec<u8>) -> Result<RasterImage> {
    let (width, height) = original.dimensions();
    Ok(RasterImage::from_raw(width, height, original.channels(), data)?
        .with_color_profile(original.color_profile().cloned()))
}
