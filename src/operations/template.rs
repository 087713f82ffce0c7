//! Social platform export templates

use super::color;
use crate::{
    error::{ErrorKind, PfpError, Result},
    types::{Dimensions, RasterImage},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};

/// Default export size used for every platform
pub const DEFAULT_TEMPLATE_SIZE: u32 = 400;

/// Supported social platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Instagram,
    Twitter,
    Facebook,
    TikTok,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Self::LinkedIn,
        Self::Instagram,
        Self::Twitter,
        Self::Facebook,
        Self::TikTok,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinkedIn => "linkedin",
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::TikTok => "tiktok",
        }
    }

    /// Visual style label associated with the platform
    #[must_use]
    pub fn style(self) -> &'static str {
        match self {
            Self::LinkedIn => "professional",
            Self::Instagram => "creative",
            Self::Twitter => "clean",
            Self::Facebook => "social",
            Self::TikTok => "modern",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PfpError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == normalized)
            .ok_or_else(|| {
                let accepted: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                PfpError::unknown_variant(ErrorKind::UnknownPlatform, s, &accepted)
            })
    }
}

/// Export target for a template operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialTarget {
    pub platform: Platform,
}

/// Platform to output dimensions lookup
///
/// Deserialized entries override the defaults; platforms left out keep 400x400.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Platform, Dimensions>",
    into = "BTreeMap<Platform, Dimensions>"
)]
pub struct TemplateTable {
    sizes: BTreeMap<Platform, Dimensions>,
}

impl From<BTreeMap<Platform, Dimensions>> for TemplateTable {
    fn from(overrides: BTreeMap<Platform, Dimensions>) -> Self {
        let mut table = Self::default();
        table.sizes.extend(overrides);
        table
    }
}

impl From<TemplateTable> for BTreeMap<Platform, Dimensions> {
    fn from(table: TemplateTable) -> Self {
        table.sizes
    }
}

impl Default for TemplateTable {
    fn default() -> Self {
        Self {
            sizes: Platform::ALL
                .into_iter()
                .map(|platform| (platform, Dimensions::square(DEFAULT_TEMPLATE_SIZE)))
                .collect(),
        }
    }
}

impl TemplateTable {
    /// Override the dimensions for one platform
    ///
    /// # Errors
    /// - `InvalidInput` for a zero width or height
    pub fn set(&mut self, platform: Platform, dimensions: Dimensions) -> Result<()> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(PfpError::invalid_input(format!(
                "template size for {} must be positive, got {}",
                platform, dimensions
            )));
        }
        self.sizes.insert(platform, dimensions);
        Ok(())
    }

    /// # Errors
    /// - `UnknownPlatform` when the table has no entry for the platform
    pub fn resolve(&self, platform: Platform) -> Result<Dimensions> {
        self.sizes.get(&platform).copied().ok_or_else(|| {
            PfpError::UnknownPlatform(format!("no template configured for '{}'", platform))
        })
    }

    /// Check every configured size is positive
    ///
    /// # Errors
    /// - `InvalidInput` for a zero dimension
    pub fn validate(&self) -> Result<()> {
        for (platform, dimensions) in &self.sizes {
            if dimensions.width == 0 || dimensions.height == 0 {
                return Err(PfpError::invalid_input(format!(
                    "template size for {} must be positive, got {}",
                    platform, dimensions
                )));
            }
        }
        Ok(())
    }
}

/// Cover-fit, center-anchored resize to the platform's exact dimensions
///
/// # Errors
/// - `UnknownPlatform` when the table has no entry for the target
pub fn apply_template(
    image: &RasterImage,
    target: SocialTarget,
    table: &TemplateTable,
) -> Result<RasterImage> {
    let Dimensions { width, height } = table.resolve(target.platform)?;
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    color::resize_to_fill(image, width, height)
}
