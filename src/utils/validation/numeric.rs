//! Numeric validation utilities
//!
//! Domain checks for operation parameters. Every failure is an
//! `InvalidInput` error naming the parameter and its valid range.

use crate::error::{PfpError, Result};

/// Largest accepted Gaussian sigma for blur and sharpening
pub const MAX_SIGMA: f32 = 1000.0;

/// Largest accepted canvas side in pixels
pub const MAX_CANVAS_DIMENSION: u32 = 16_384;

/// Largest accepted canvas area in pixels (64 megapixels)
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

/// Validator for numeric operation parameters
pub struct NumericValidator;

impl NumericValidator {
    /// Reject NaN and infinities
    pub fn validate_finite(value: f32, name: &str) -> Result<f32> {
        if !value.is_finite() {
            return Err(PfpError::invalid_input(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate a finite value inside an inclusive range
    pub fn validate_range(value: f32, min: f32, max: f32, name: &str) -> Result<f32> {
        Self::validate_finite(value, name)?;
        if value < min || value > max {
            return Err(PfpError::value_out_of_range(
                name,
                value,
                &format!("{}..={}", min, max),
            ));
        }
        Ok(value)
    }

    /// Validate that a value is strictly positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if value <= T::default() {
            return Err(PfpError::invalid_input(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate a Gaussian sigma: finite, zero or greater, at most [`MAX_SIGMA`]
    pub fn validate_sigma(value: f32, name: &str) -> Result<f32> {
        Self::validate_range(value, 0.0, MAX_SIGMA, name)
    }

    /// Validate the size of a canvas that will be allocated as RGBA
    pub fn validate_canvas(width: u32, height: u32, name: &str) -> Result<(u32, u32)> {
        Self::validate_positive(width, &format!("{} width", name))?;
        Self::validate_positive(height, &format!("{} height", name))?;
        let pixels = u64::from(width) * u64::from(height);
        if width > MAX_CANVAS_DIMENSION
            || height > MAX_CANVAS_DIMENSION
            || pixels > MAX_CANVAS_PIXELS
        {
            return Err(PfpError::invalid_input(format!(
                "{} size {}x{} exceeds the limit of {} pixels per side and {} pixels total",
                name, width, height, MAX_CANVAS_DIMENSION, MAX_CANVAS_PIXELS
            )));
        }
        Ok((width, height))
    }

    /// Validate quality setting (0-100)
    pub fn validate_quality(value: u8) -> Result<u8> {
        if value > 100 {
            return Err(PfpError::invalid_input(format!(
                "Quality must be between 0 and 100, got {}",
                value
            )));
        }
        Ok(value)
    }
}
