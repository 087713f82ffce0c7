//! Background rendering and compositing
//!
//! A background layer is rendered at the canvas size and the foreground is
//! placed centered on top of it with Porter-Duff "over".

use super::color;
use crate::{
    error::{ErrorKind, PfpError, Result},
    services::{ImageIOService, SourceLoader},
    types::RasterImage,
    utils::NumericValidator,
};
use image::{imageops, Rgba, RgbaImage};
use log::{debug, warn};
use std::str::FromStr;
use tiny_skia::{
    FillRule, GradientStop, LinearGradient, Paint, PathBuilder, Pixmap, Point, Rect, SpreadMode,
    Transform,
};

/// Pattern cell size in pixels
const PATTERN_CELL: f32 = 20.0;
const PATTERN_DOT_RADIUS: f32 = 2.0;
const PATTERN_INK: Color = Color::rgb(0xe0, 0xe0, 0xe0);

/// CSS named colors accepted by [`Color::from_str`], keyed in lowercase
const NAMED_COLORS: &[(&str, Color)] = &[
    ("aqua", Color::rgb(0, 255, 255)),
    ("beige", Color::rgb(245, 245, 220)),
    ("black", Color::rgb(0, 0, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("brown", Color::rgb(165, 42, 42)),
    ("coral", Color::rgb(255, 127, 80)),
    ("crimson", Color::rgb(220, 20, 60)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("darkblue", Color::rgb(0, 0, 139)),
    ("darkgray", Color::rgb(169, 169, 169)),
    ("darkgreen", Color::rgb(0, 100, 0)),
    ("darkgrey", Color::rgb(169, 169, 169)),
    ("darkred", Color::rgb(139, 0, 0)),
    ("fuchsia", Color::rgb(255, 0, 255)),
    ("gold", Color::rgb(255, 215, 0)),
    ("gray", Color::rgb(128, 128, 128)),
    ("green", Color::rgb(0, 128, 0)),
    ("grey", Color::rgb(128, 128, 128)),
    ("hotpink", Color::rgb(255, 105, 180)),
    ("indigo", Color::rgb(75, 0, 130)),
    ("ivory", Color::rgb(255, 255, 240)),
    ("khaki", Color::rgb(240, 230, 140)),
    ("lavender", Color::rgb(230, 230, 250)),
    ("lightblue", Color::rgb(173, 216, 230)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("lightgreen", Color::rgb(144, 238, 144)),
    ("lightgrey", Color::rgb(211, 211, 211)),
    ("lightpink", Color::rgb(255, 182, 193)),
    ("lime", Color::rgb(0, 255, 0)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("mintcream", Color::rgb(245, 255, 250)),
    ("navy", Color::rgb(0, 0, 128)),
    ("olive", Color::rgb(128, 128, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("orchid", Color::rgb(218, 112, 214)),
    ("pink", Color::rgb(255, 192, 203)),
    ("plum", Color::rgb(221, 160, 221)),
    ("purple", Color::rgb(128, 0, 128)),
    ("red", Color::rgb(255, 0, 0)),
    ("salmon", Color::rgb(250, 128, 114)),
    ("silver", Color::rgb(192, 192, 192)),
    ("skyblue", Color::rgb(135, 206, 235)),
    ("tan", Color::rgb(210, 180, 140)),
    ("teal", Color::rgb(0, 128, 128)),
    ("tomato", Color::rgb(255, 99, 71)),
    ("transparent", Color::TRANSPARENT),
    ("turquoise", Color::rgb(64, 224, 208)),
    ("violet", Color::rgb(238, 130, 238)),
    ("white", Color::WHITE),
    ("whitesmoke", Color::rgb(245, 245, 245)),
    ("yellow", Color::rgb(255, 255, 0)),
];

/// Straight-alpha RGBA color
///
/// Parses from `#rgb`, `#rrggbb` and `#rrggbbaa` hex, or from a common subset
/// of the CSS named colors (case-insensitive, e.g. `orange`, `navy`,
/// `lightgray`). The full CSS keyword list and `rgb()`/`hsl()` functional
/// notation are not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    fn with_opacity(self, opacity: f32) -> Self {
        let a = (f32::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

impl FromStr for Color {
    type Err = PfpError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex)
                .ok_or_else(|| PfpError::invalid_input(format!("invalid hex color '{}'", value)));
        }

        let name = value.to_ascii_lowercase();
        NAMED_COLORS
            .binary_search_by(|(key, _)| (*key).cmp(name.as_str()))
            .ok()
            .and_then(|index| NAMED_COLORS.get(index))
            .map(|(_, color)| *color)
            .ok_or_else(|| PfpError::invalid_input(format!("unrecognized color '{}'", value)))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let nibble = |i: usize| {
        let v = u8::from_str_radix(hex.get(i..=i)?, 16).ok()?;
        Some(v * 17)
    };

    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: byte(6)?,
        }),
        _ => None,
    }
}

/// One color stop of a linear gradient, offset in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Diagonal linear gradient running from the top-left to the bottom-right corner
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<ColorStop>,
}

impl Gradient {
    #[must_use]
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Clamp offsets into range and make them non-decreasing
    fn from_stops(mut stops: Vec<ColorStop>) -> Result<Self> {
        if stops.is_empty() {
            return Err(PfpError::invalid_input("gradient has no color stops"));
        }
        let mut floor = 0.0_f32;
        for stop in &mut stops {
            stop.offset = stop.offset.clamp(0.0, 1.0).max(floor);
            floor = stop.offset;
        }
        Ok(Self { stops })
    }
}

impl FromStr for Gradient {
    type Err = PfpError;

    /// Accepts SVG `<stop>` elements or a compact `"#hex [pct], #hex [pct]"` list
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if value.contains("<stop") {
            parse_svg_stops(value)
        } else {
            parse_compact_stops(value)
        }
    }
}

fn parse_svg_stops(markup: &str) -> Result<Gradient> {
    let mut stops = Vec::new();
    for element in markup.split("<stop").skip(1) {
        let tag = element.split('>').next().unwrap_or_default();
        let style = attribute(tag, "style").unwrap_or_default();

        let offset = attribute(tag, "offset").map_or(Ok(0.0), parse_offset)?;
        let color_value = attribute(tag, "stop-color")
            .or_else(|| style_property(style, "stop-color"))
            .ok_or_else(|| PfpError::invalid_input("gradient stop without stop-color"))?;
        let mut color: Color = color_value.parse()?;
        let opacity =
            attribute(tag, "stop-opacity").or_else(|| style_property(style, "stop-opacity"));
        if let Some(opacity) = opacity {
            let opacity: f32 = opacity.trim().parse().map_err(|_| {
                PfpError::invalid_input(format!("invalid stop-opacity '{}'", opacity))
            })?;
            color = color.with_opacity(opacity);
        }
        stops.push(ColorStop { offset, color });
    }
    Gradient::from_stops(stops)
}

fn parse_compact_stops(list: &str) -> Result<Gradient> {
    let entries: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    let last = entries.len().saturating_sub(1).max(1) as f32;

    let mut stops = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let mut parts = entry.split_whitespace();
        let color: Color = parts.next().unwrap_or_default().parse()?;
        let offset = match parts.next() {
            Some(offset) => parse_offset(offset)?,
            None => i as f32 / last,
        };
        stops.push(ColorStop { offset, color });
    }
    Gradient::from_stops(stops)
}

fn parse_offset(raw: &str) -> Result<f32> {
    let raw = raw.trim();
    let parsed = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().map(|v| v / 100.0),
        None => raw.parse::<f32>(),
    };
    parsed
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PfpError::invalid_input(format!("invalid gradient offset '{}'", raw)))
}

/// Value of `name="..."` (or single-quoted) inside a tag body
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = tag;
    while let Some(pos) = search.find(name) {
        let preceded_ok = search[..pos]
            .chars()
            .last()
            .map_or(true, char::is_whitespace);
        let rest = search[pos + name.len()..].trim_start();
        if preceded_ok {
            if let Some(rest) = rest.strip_prefix('=') {
                let rest = rest.trim_start();
                let quote = rest.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let body = &rest[1..];
                    return body.find(quote).map(|end| &body[..end]);
                }
            }
        }
        search = &search[pos + name.len()..];
    }
    None
}

/// Value of `name: value` inside an inline CSS style
fn style_property<'a>(style: &'a str, name: &str) -> Option<&'a str> {
    style.split(';').find_map(|declaration| {
        let (key, value) = declaration.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// Built-in tiling patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    Dots,
    Lines,
    /// Any other name renders plain white
    Other(String),
}

impl PatternKind {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "dots" => Self::Dots,
            "lines" => Self::Lines,
            _ => Self::Other(name.to_string()),
        }
    }
}

/// What the background layer is made of
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundLayer {
    Color(Color),
    Gradient(Gradient),
    Pattern(PatternKind),
    /// Externally referenced image, optionally blurred by the given sigma
    Image { source: String, blur: Option<f32> },
}

/// Background to composite behind the current image
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSpec {
    pub layer: BackgroundLayer,
    /// Explicit canvas size; the current image size when absent
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl BackgroundSpec {
    pub const TYPES: [&'static str; 4] = ["color", "gradient", "pattern", "image"];

    #[must_use]
    pub fn new(layer: BackgroundLayer) -> Self {
        Self {
            layer,
            width: None,
            height: None,
        }
    }

    /// Build a spec from its wire parts: `type`, `value` and optional `blur`
    ///
    /// # Errors
    /// - `InvalidBackgroundType` for an unknown type tag
    /// - `InvalidInput` for an unparsable color or gradient, or a negative blur
    pub fn from_parts(kind: &str, value: &str, blur: Option<f32>) -> Result<Self> {
        let layer = match kind.trim().to_ascii_lowercase().as_str() {
            "color" => BackgroundLayer::Color(value.parse()?),
            "gradient" => BackgroundLayer::Gradient(value.parse()?),
            "pattern" => BackgroundLayer::Pattern(PatternKind::parse(value)),
            "image" => {
                if value.trim().is_empty() {
                    return Err(PfpError::invalid_input("image background needs a source"));
                }
                BackgroundLayer::Image {
                    source: value.trim().to_string(),
                    blur,
                }
            },
            _ => {
                return Err(PfpError::unknown_variant(
                    ErrorKind::InvalidBackgroundType,
                    kind,
                    &Self::TYPES,
                ))
            },
        };
        let spec = Self::new(layer);
        spec.validate()?;
        Ok(spec)
    }

    #[must_use]
    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Domain checks that do not require loading anything
    ///
    /// # Errors
    /// - `InvalidInput` for a zero or oversized canvas, or a blur outside `0..=1000`
    pub fn validate(&self) -> Result<()> {
        if let Some(width) = self.width {
            NumericValidator::validate_positive(width, "background width")?;
        }
        if let Some(height) = self.height {
            NumericValidator::validate_positive(height, "background height")?;
        }
        if self.width.is_some() || self.height.is_some() {
            // A missing side follows the foreground, which is at least one pixel
            let width = self.width.unwrap_or(1);
            let height = self.height.unwrap_or(1);
            NumericValidator::validate_canvas(width, height, "background")?;
        }
        if let BackgroundLayer::Image {
            blur: Some(blur), ..
        } = &self.layer
        {
            NumericValidator::validate_sigma(*blur, "background blur")?;
        }
        Ok(())
    }

    /// Canvas size for a foreground of the given dimensions
    #[must_use]
    pub fn canvas_size(&self, foreground: (u32, u32)) -> (u32, u32) {
        (
            self.width.unwrap_or(foreground.0),
            self.height.unwrap_or(foreground.1),
        )
    }
}

/// A background layer with all external data fetched
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundFill {
    Color(Color),
    Gradient(Gradient),
    Pattern(PatternKind),
    Image { bytes: Vec<u8>, blur: Option<f32> },
}

impl BackgroundFill {
    /// Fetch whatever the layer references
    ///
    /// # Errors
    /// - `SourceUnavailable` when the loader cannot produce the image bytes
    pub async fn resolve(spec: &BackgroundSpec, loader: &dyn SourceLoader) -> Result<Self> {
        Ok(match &spec.layer {
            BackgroundLayer::Color(color) => Self::Color(*color),
            BackgroundLayer::Gradient(gradient) => Self::Gradient(gradient.clone()),
            BackgroundLayer::Pattern(pattern) => Self::Pattern(pattern.clone()),
            BackgroundLayer::Image { source, blur } => {
                debug!("Loading background image from {}", source);
                let bytes = loader.load(source).await.map_err(|e| match e {
                    PfpError::SourceUnavailable(_) => e,
                    other => PfpError::source_unavailable(other.to_string()),
                })?;
                Self::Image { bytes, blur: *blur }
            },
        })
    }

    /// Render this layer at the given size
    ///
    /// # Errors
    /// - `InvalidInput` for a zero or oversized canvas
    /// - `ImageLoadFailure` when an image layer cannot be decoded
    pub fn render(&self, width: u32, height: u32) -> Result<RgbaImage> {
        NumericValidator::validate_canvas(width, height, "background")?;
        match self {
            Self::Color(color) => Ok(RgbaImage::from_pixel(width, height, color.to_rgba())),
            Self::Gradient(gradient) => render_gradient(gradient, width, height),
            Self::Pattern(pattern) => render_pattern(pattern, width, height),
            Self::Image { bytes, blur } => {
                let decoded = ImageIOService::decode(bytes, None)
                    .map_err(|e| PfpError::image_load(e.to_string()))?;
                let layer = color::resize_to_fill(&decoded, width, height)?;
                let layer = match blur {
                    Some(sigma) => color::gaussian_blur(&layer, *sigma)?,
                    None => layer,
                };
                Ok(layer.into_rgba8())
            },
        }
    }
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height).ok_or_else(|| {
        PfpError::invalid_input(format!("background size {}x{} is too large", width, height))
    })
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, premultiplied) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = premultiplied.demultiply();
        *pixel = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

fn render_gradient(gradient: &Gradient, width: u32, height: u32) -> Result<RgbaImage> {
    let mut pixmap = new_pixmap(width, height)?;
    let stops: Vec<GradientStop> = gradient
        .stops()
        .iter()
        .map(|stop| GradientStop::new(stop.offset, stop.color.to_skia()))
        .collect();

    // Unit square mapped onto the canvas, like an SVG objectBoundingBox gradient
    let shader = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(1.0, 1.0),
        stops,
        SpreadMode::Pad,
        Transform::from_scale(width as f32, height as f32),
    )
    .ok_or_else(|| PfpError::invalid_input("gradient could not be built from its stops"))?;

    let mut paint = Paint::default();
    paint.shader = shader;
    let rect = Rect::from_xywh(0.0, 0.0, width as f32, height as f32)
        .ok_or_else(|| PfpError::internal("invalid gradient canvas"))?;
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);

    Ok(pixmap_to_rgba(&pixmap))
}

fn render_pattern(pattern: &PatternKind, width: u32, height: u32) -> Result<RgbaImage> {
    let mut pixmap = new_pixmap(width, height)?;
    pixmap.fill(Color::WHITE.to_skia());

    let mut paint = Paint::default();
    paint.set_color(PATTERN_INK.to_skia());
    paint.anti_alias = true;

    let columns = (width as f32 / PATTERN_CELL).ceil() as u32;
    let rows = (height as f32 / PATTERN_CELL).ceil() as u32;

    match pattern {
        PatternKind::Dots => {
            let mut pb = PathBuilder::new();
            for row in 0..rows {
                for col in 0..columns {
                    pb.push_circle(
                        col as f32 * PATTERN_CELL + PATTERN_CELL / 2.0,
                        row as f32 * PATTERN_CELL + PATTERN_CELL / 2.0,
                        PATTERN_DOT_RADIUS,
                    );
                }
            }
            if let Some(path) = pb.finish() {
                pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }
        },
        PatternKind::Lines => {
            // 1px stroke centered on y = 10 within each cell
            for row in 0..rows {
                let y = row as f32 * PATTERN_CELL + PATTERN_CELL / 2.0 - 0.5;
                if let Some(rect) = Rect::from_xywh(0.0, y, width as f32, 1.0) {
                    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
        },
        PatternKind::Other(name) => {
            warn!("Unknown background pattern '{}', using plain white", name);
        },
    }

    Ok(pixmap_to_rgba(&pixmap))
}

/// Composite `foreground` centered over the rendered layer with "over"
///
/// # Errors
/// - `InvalidInput` for a zero or oversized canvas
/// - `ImageLoadFailure` when an image layer cannot be decoded
pub fn compose(
    foreground: &RasterImage,
    fill: &BackgroundFill,
    width: u32,
    height: u32,
) -> Result<RasterImage> {
    let mut canvas = fill.render(width, height)?;
    let top = foreground.to_rgba8();
    let x = (i64::from(width) - i64::from(top.width())) / 2;
    let y = (i64::from(height) - i64::from(top.height())) / 2;
    imageops::overlay(&mut canvas, &top, x, y);

    Ok(RasterImage::from_rgba8(canvas).with_color_profile(foreground.color_profile().cloned()))
}
