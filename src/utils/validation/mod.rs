//! Input validation helpers

mod numeric;

pub use numeric::{NumericValidator, MAX_CANVAS_DIMENSION, MAX_CANVAS_PIXELS, MAX_SIGMA};
