//! Pipeline stages
//!
//! Every stage is a pure function from one [`RasterImage`](crate::types::RasterImage)
//! to a new one. Background removal is the only stage not implemented here; it
//! is delegated to a [`BackgroundRemover`](crate::backends::BackgroundRemover).

pub mod adjust;
pub mod background;
mod color;
pub mod crop;
pub mod filter;
pub mod mask;
pub mod template;

pub use adjust::{adjust, Adjustment, AdjustmentBuilder};
pub use background::{
    compose, BackgroundFill, BackgroundLayer, BackgroundSpec, Color, Gradient, PatternKind,
};
pub use crop::{crop_to_shape, ShapeSpec};
pub use filter::{apply_filter, apply_named_filter, FilterPreset};
pub use mask::{generate_mask, Shape};
pub use template::{apply_template, Platform, SocialTarget, TemplateTable};

use crate::error::Result;

/// One step of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    RemoveBackground,
    Adjustments(Adjustment),
    Filter(FilterPreset),
    AddBackground(BackgroundSpec),
    CropToShape(ShapeSpec),
    ApplyTemplate(SocialTarget),
}

/// Discriminant of an [`Operation`], used for logging and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RemoveBackground,
    Adjustments,
    Filter,
    AddBackground,
    CropToShape,
    ApplyTemplate,
}

impl OperationKind {
    /// Wire name of the operation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoveBackground => "removeBackground",
            Self::Adjustments => "adjustments",
            Self::Filter => "filter",
            Self::AddBackground => "addBackground",
            Self::CropToShape => "cropToShape",
            Self::ApplyTemplate => "applyTemplate",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::RemoveBackground => OperationKind::RemoveBackground,
            Self::Adjustments(_) => OperationKind::Adjustments,
            Self::Filter(_) => OperationKind::Filter,
            Self::AddBackground(_) => OperationKind::AddBackground,
            Self::CropToShape(_) => OperationKind::CropToShape,
            Self::ApplyTemplate(_) => OperationKind::ApplyTemplate,
        }
    }

    /// Domain checks that can run before any pixel is touched
    ///
    /// # Errors
    /// - `InvalidInput` for out-of-domain parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RemoveBackground | Self::Filter(_) | Self::ApplyTemplate(_) => Ok(()),
            Self::Adjustments(adjustment) => adjustment.validate(),
            Self::AddBackground(spec) => spec.validate(),
            Self::CropToShape(spec) => spec.validate(),
        }
    }
}
