//! Configuration types for pipeline invocations

use crate::{
    error::{PfpError, Result},
    operations::{Platform, TemplateTable},
    types::Dimensions,
    utils::NumericValidator,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Largest accepted source image in bytes
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 10 * 1024 * 1024;

/// Longest side a decoded source is allowed to keep
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 2048;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG, flattened onto white
    Jpeg,
    /// Lossless WebP with alpha channel transparency
    WebP,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Configuration shared by every invocation of a `PipelineProcessor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Time budget for one background removal call
    #[serde(with = "duration_secs")]
    pub removal_timeout: Duration,

    /// Embed the source ICC color profile in the output (default: true)
    pub preserve_color_profiles: bool,

    /// Largest accepted source, in bytes
    pub max_source_bytes: u64,

    /// Sources with a longer side are downscaled at decode; `None` disables
    pub max_image_dimension: Option<u32>,

    /// Platform to export dimensions table
    pub templates: TemplateTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            removal_timeout: Duration::from_secs(30),
            preserve_color_profiles: true,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_image_dimension: Some(DEFAULT_MAX_IMAGE_DIMENSION),
            templates: TemplateTable::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pfpgen::{OutputFormat, PipelineConfig};
    /// use std::time::Duration;
    ///
    /// let config = PipelineConfig::builder()
    ///     .output_format(OutputFormat::Jpeg)
    ///     .jpeg_quality(85)
    ///     .removal_timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.jpeg_quality, 85);
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; absent fields take their defaults
    ///
    /// # Errors
    /// - `InvalidInput` when the file cannot be read, parsed or validated
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PfpError::invalid_input(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            PfpError::invalid_input(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - Zero removal timeout, source limit or dimension limit
    /// - Template entries with a zero dimension
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_quality(self.jpeg_quality)?;
        if self.removal_timeout.is_zero() {
            return Err(PfpError::invalid_input("removal timeout must be positive"));
        }
        NumericValidator::validate_positive(self.max_source_bytes, "max source bytes")?;
        if let Some(limit) = self.max_image_dimension {
            NumericValidator::validate_positive(limit, "max image dimension")?;
        }
        self.templates.validate()
    }

    /// Quality passed to the encoder for the configured format
    ///
    /// Only JPEG is lossy; PNG and WebP are always encoded losslessly.
    #[must_use]
    pub fn output_quality(&self) -> u8 {
        match self.output_format {
            OutputFormat::Jpeg => self.jpeg_quality,
            OutputFormat::WebP | OutputFormat::Png => 100,
        }
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
    template_overrides: Vec<(Platform, Dimensions)>,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            template_overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality; values above 100 are clamped
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    #[must_use]
    pub fn removal_timeout(mut self, timeout: Duration) -> Self {
        self.config.removal_timeout = timeout;
        self
    }

    #[must_use]
    pub fn preserve_color_profiles(mut self, preserve: bool) -> Self {
        self.config.preserve_color_profiles = preserve;
        self
    }

    #[must_use]
    pub fn max_source_bytes(mut self, bytes: u64) -> Self {
        self.config.max_source_bytes = bytes;
        self
    }

    #[must_use]
    pub fn max_image_dimension(mut self, limit: Option<u32>) -> Self {
        self.config.max_image_dimension = limit;
        self
    }

    #[must_use]
    pub fn templates(mut self, templates: TemplateTable) -> Self {
        self.config.templates = templates;
        self
    }

    /// Override the export size of a single platform
    #[must_use]
    pub fn template_size(mut self, platform: Platform, dimensions: Dimensions) -> Self {
        self.template_overrides.push((platform, dimensions));
        self
    }

    /// Build the configuration with validation
    ///
    /// # Errors
    /// - Any rule of [`PipelineConfig::validate`]
    pub fn build(self) -> Result<PipelineConfig> {
        let mut config = self.config;
        for (platform, dimensions) in self.template_overrides {
            config.templates.set(platform, dimensions)?;
        }
        config.validate()?;
        Ok(config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
