//! Shared helpers for the integration tests

#![allow(dead_code)]

use image::RgbaImage;
use pfpgen::{
    backends::mock::FixtureRemover, BackgroundRemover, ColorProfile, ImageIOService,
    OutputFormat, PipelineConfig, PipelineProcessor, RasterImage,
};
use std::sync::Arc;

/// Synthetic opaque portrait: warm skin tones fading toward the edges
pub fn portrait(width: u32, height: u32) -> RasterImage {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    for y in 0..height {
        for x in 0..width {
            let dx = (x as f32 - cx) / cx;
            let dy = (y as f32 - cy) / cy;
            let falloff = (dx * dx + dy * dy).sqrt().min(1.0);
            let r = 220.0 - 30.0 * falloff;
            let g = 170.0 - 20.0 * falloff;
            let b = 130.0 - 10.0 * falloff;
            data.extend_from_slice(&[r as u8, g as u8, b as u8]);
        }
    }
    RasterImage::from_raw(width, height, 3, data).unwrap()
}

pub fn portrait_jpeg(width: u32, height: u32) -> Vec<u8> {
    ImageIOService::encode(&portrait(width, height), OutputFormat::Jpeg, 92, false).unwrap()
}

pub fn portrait_png(width: u32, height: u32) -> Vec<u8> {
    ImageIOService::encode(&portrait(width, height), OutputFormat::Png, 100, false).unwrap()
}

/// PNG carrying the given ICC profile
pub fn portrait_png_with_profile(width: u32, height: u32, icc: Vec<u8>) -> Vec<u8> {
    let image =
        portrait(width, height).with_color_profile(Some(ColorProfile::from_icc_data(icc)));
    ImageIOService::encode(&image, OutputFormat::Png, 100, true).unwrap()
}

/// Minimal ICC blob whose header declares an RGB display profile
pub fn fake_srgb_profile() -> Vec<u8> {
    let mut profile = vec![0u8; 128];
    profile[0..4].copy_from_slice(&145u32.to_be_bytes());
    profile[4..8].copy_from_slice(b"ADSP");
    profile[12..16].copy_from_slice(b"mntr");
    profile[16..20].copy_from_slice(b"RGB ");
    profile[20..24].copy_from_slice(b"XYZ ");
    profile[36..40].copy_from_slice(b"acsp");
    profile.extend_from_slice(b"sRGB IEC61966-2.1");
    profile
}

pub fn decode_rgba(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

pub fn processor_with(
    remover: Arc<dyn BackgroundRemover>,
    config: PipelineConfig,
) -> PipelineProcessor {
    PipelineProcessor::new(config, remover).unwrap()
}

pub fn fixture_processor() -> (PipelineProcessor, FixtureRemover) {
    let remover = FixtureRemover::new();
    let processor = processor_with(Arc::new(remover.clone()), PipelineConfig::default());
    (processor, remover)
}

/// Pixels of `image` whose distance from the center falls in `[inner, outer)`
pub fn ring_pixels(image: &RgbaImage, inner: f32, outer: f32) -> Vec<[u8; 4]> {
    let cx = image.width() as f32 / 2.0;
    let cy = image.height() as f32 / 2.0;
    image
        .enumerate_pixels()
        .filter(|(x, y, _)| {
            let dx = *x as f32 + 0.5 - cx;
            let dy = *y as f32 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            distance >= inner && distance < outer
        })
        .map(|(_, _, pixel)| pixel.0)
        .collect()
}

/// Mean of `blue - red` over fully opaque pixels
pub fn blue_bias(pixels: &[[u8; 4]]) -> f32 {
    let opaque: Vec<_> = pixels.iter().filter(|p| p[3] == 255).collect();
    assert!(!opaque.is_empty(), "no opaque pixels to measure");
    opaque
        .iter()
        .map(|p| f32::from(p[2]) - f32::from(p[0]))
        .sum::<f32>()
        / opaque.len() as f32
}
