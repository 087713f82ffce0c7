//! Shared utilities

pub mod validation;

pub use validation::{NumericValidator, MAX_CANVAS_DIMENSION, MAX_CANVAS_PIXELS, MAX_SIGMA};
