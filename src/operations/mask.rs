//! Alpha mask generation for the fixed crop shapes
//!
//! Masks are rasterized with anti-aliasing. Heart and star outlines are
//! defined in a 100x100 design space and scaled to the requested size.

use crate::{
    error::{ErrorKind, PfpError, Result},
    types::RasterImage,
};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Transform};

/// Side length of the design space used by the outline shapes
const DESIGN_SPACE: f32 = 100.0;

/// Corner radius of `rounded-square` relative to the mask size
const ROUNDED_CORNER_RATIO: f32 = 0.1;

/// Control point distance of a cubic Bezier quarter circle, relative to its radius
const KAPPA: f32 = 0.552_284_8;

const STAR_POINTS: [(f32, f32); 10] = [
    (50.0, 5.0),
    (61.0, 35.0),
    (95.0, 35.0),
    (68.0, 57.0),
    (79.0, 91.0),
    (50.0, 70.0),
    (21.0, 91.0),
    (32.0, 57.0),
    (5.0, 35.0),
    (39.0, 35.0),
];

/// Crop shapes supported by the mask generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Circle,
    Square,
    RoundedSquare,
    Heart,
    Star,
}

impl Shape {
    pub const ALL: [Shape; 5] = [
        Self::Circle,
        Self::Square,
        Self::RoundedSquare,
        Self::Heart,
        Self::Star,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::RoundedSquare => "rounded-square",
            Self::Heart => "heart",
            Self::Star => "star",
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = PfpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "circle" => Ok(Self::Circle),
            "square" => Ok(Self::Square),
            "rounded-square" | "rounded_square" | "rounded" => Ok(Self::RoundedSquare),
            "heart" => Ok(Self::Heart),
            "star" => Ok(Self::Star),
            _ => {
                let accepted: Vec<&str> = Self::ALL.iter().map(|shape| shape.as_str()).collect();
                Err(PfpError::unknown_variant(
                    ErrorKind::InvalidShape,
                    s,
                    &accepted,
                ))
            },
        }
    }
}

/// Generate a white RGBA mask whose alpha is the shape's coverage
///
/// # Errors
/// - `InvalidInput` when `size` is zero
pub fn generate_mask(shape: Shape, size: u32) -> Result<RasterImage> {
    if size == 0 {
        return Err(PfpError::invalid_input("mask size must be positive"));
    }

    let mut pixmap = Pixmap::new(size, size)
        .ok_or_else(|| PfpError::invalid_input(format!("mask size {} is too large", size)))?;

    let side = size as f32;
    let (path, transform) = match shape {
        Shape::Circle => (
            PathBuilder::from_circle(side / 2.0, side / 2.0, side / 2.0),
            Transform::identity(),
        ),
        Shape::Square => (
            Rect::from_xywh(0.0, 0.0, side, side).map(PathBuilder::from_rect),
            Transform::identity(),
        ),
        Shape::RoundedSquare => (
            rounded_square_path(side, side * ROUNDED_CORNER_RATIO),
            Transform::identity(),
        ),
        Shape::Heart => (heart_path(), design_space_transform(side)),
        Shape::Star => (star_path(), design_space_transform(side)),
    };
    let path = path.ok_or_else(|| PfpError::internal(format!("failed to build {} path", shape)))?;

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;
    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);

    let mut mask = RgbaImage::new(size, size);
    for (pixel, coverage) in mask.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        *pixel = Rgba([255, 255, 255, coverage[3]]);
    }

    Ok(RasterImage::from_rgba8(mask))
}

fn design_space_transform(side: f32) -> Transform {
    let scale = side / DESIGN_SPACE;
    Transform::from_scale(scale, scale)
}

fn rounded_square_path(side: f32, radius: f32) -> Option<Path> {
    let r = radius.min(side / 2.0);
    let k = r * (1.0 - KAPPA);
    let mut pb = PathBuilder::new();
    pb.move_to(r, 0.0);
    pb.line_to(side - r, 0.0);
    pb.cubic_to(side - k, 0.0, side, k, side, r);
    pb.line_to(side, side - r);
    pb.cubic_to(side, side - k, side - k, side, side - r, side);
    pb.line_to(r, side);
    pb.cubic_to(k, side, 0.0, side - k, 0.0, side - r);
    pb.line_to(0.0, r);
    pb.cubic_to(0.0, k, k, 0.0, r, 0.0);
    pb.close();
    pb.finish()
}

fn heart_path() -> Option<Path> {
    let mut pb = PathBuilder::new();
    pb.move_to(50.0, 25.0);
    pb.cubic_to(50.0, 15.0, 30.0, 5.0, 20.0, 25.0);
    pb.cubic_to(10.0, 45.0, 50.0, 85.0, 50.0, 85.0);
    pb.cubic_to(50.0, 85.0, 90.0, 45.0, 80.0, 25.0);
    pb.cubic_to(70.0, 5.0, 50.0, 15.0, 50.0, 25.0);
    pb.close();
    pb.finish()
}

fn star_path() -> Option<Path> {
    let mut pb = PathBuilder::new();
    let (first, rest) = STAR_POINTS.split_first()?;
    pb.move_to(first.0, first.1);
    for &(x, y) in rest {
        pb.line_to(x, y);
    }
    pb.close();
    pb.finish()
}
