#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # pfpgen
//!
//! Image transformation core of a profile picture generator. A source photo
//! goes through a caller-ordered list of operations:
//!
//! - **Background removal** through a pluggable [`BackgroundRemover`]
//! - **Adjustments**: brightness, contrast, saturation, hue, gamma, blur, sharpening
//! - **Filters**: professional, vintage, dramatic, soft, blackwhite, warm, cool
//! - **Backgrounds**: flat colors, gradients, patterns or another image
//! - **Shape crops**: circle, square, rounded square, heart, star
//! - **Social templates**: fixed export sizes for LinkedIn, Instagram, Twitter,
//!   Facebook and TikTok
//!
//! The output is PNG, JPEG or lossless WebP with the source ICC color profile
//! preserved. Every stage is deterministic: the same input and operations
//! always produce byte-identical output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pfpgen::{
//!     backends::HttpBackgroundRemover, parse_operations_str, PipelineConfig, PipelineProcessor,
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let remover = HttpBackgroundRemover::new(
//!     "https://segmentation.internal/v1/remove",
//!     Duration::from_secs(30),
//! )?;
//! let processor = PipelineProcessor::new(PipelineConfig::default(), Arc::new(remover))?;
//!
//! let operations = parse_operations_str(
//!     r##"["removeBackground",
//!         {"filter": "professional"},
//!         {"addBackground": {"type": "color", "value": "#336699"}},
//!         {"cropToShape": {"shape": "circle", "size": 400}}]"##,
//! )?;
//! let result = processor.process_bytes(&upload, &operations).await?;
//! std::fs::write("avatar.png", &result.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `pfpgen` command-line front-end
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! pfpgen = { version = "0.1", default-features = false, features = ["webp-support"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod operations;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;
pub mod wire;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::{BackgroundRemover, HttpBackgroundRemover, UnavailableRemover};
pub use config::{OutputFormat, PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, PfpError, PipelineError, PipelineStage, Result};
pub use operations::{
    Adjustment, BackgroundSpec, FilterPreset, Operation, OperationKind, Platform, Shape,
    ShapeSpec, SocialTarget, TemplateTable,
};
pub use processor::{PipelineProcessor, PipelineProcessorBuilder};
pub use services::{
    ConsoleProgressReporter, DefaultSourceLoader, ImageIOService, NoOpProgressReporter,
    OutputFormatHandler, ProgressReporter, ProgressTracker, ProgressUpdate, SourceLoader,
};
pub use types::{ColorProfile, Dimensions, ProcessedImage, ProcessingMetadata, RasterImage};
pub use utils::{NumericValidator, MAX_CANVAS_DIMENSION, MAX_CANVAS_PIXELS, MAX_SIGMA};
pub use wire::{parse_operations, parse_operations_str, ProcessRequest, ProcessingStatus};

#[cfg(feature = "cli")]
pub use tracing_config::{spans, TracingConfig, TracingFormat};

/// Run `operations` on encoded image bytes with a one-off processor
///
/// Suitable for request handlers that already hold the uploaded bytes.
///
/// # Examples
/// ```rust,no_run
/// use pfpgen::{generate_from_bytes, FilterPreset, Operation, PipelineConfig, UnavailableRemover};
/// use std::sync::Arc;
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let ops = [Operation::Filter(FilterPreset::Warm)];
/// let result = generate_from_bytes(
///     &upload,
///     &ops,
///     PipelineConfig::default(),
///     Arc::new(UnavailableRemover),
/// )
/// .await?;
/// println!("{} -> {}", result.dimensions, result.digest());
/// # Ok(())
/// # }
/// ```
pub async fn generate_from_bytes(
    image_bytes: &[u8],
    operations: &[Operation],
    config: PipelineConfig,
    remover: std::sync::Arc<dyn BackgroundRemover>,
) -> std::result::Result<ProcessedImage, PipelineError> {
    let processor = PipelineProcessor::new(config, remover)
        .map_err(|e| PipelineError::new(PipelineStage::SourceLoad, e))?;
    processor.process_bytes(image_bytes, operations).await
}

/// Like [`generate_from_bytes`], reading the image from an async stream
///
/// # Examples
/// ```rust,no_run
/// use pfpgen::{generate_from_reader, PipelineConfig, UnavailableRemover};
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("portrait.jpg").await?;
/// let ops = pfpgen::parse_operations_str(r#"[{"applyTemplate": {"platform": "linkedin"}}]"#)?;
/// let result =
///     generate_from_reader(file, &ops, PipelineConfig::default(), Arc::new(UnavailableRemover))
///         .await?;
/// tokio::fs::write("linkedin.png", result.bytes).await?;
/// # Ok(())
/// # }
/// ```
pub async fn generate_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    operations: &[Operation],
    config: PipelineConfig,
    remover: std::sync::Arc<dyn BackgroundRemover>,
) -> std::result::Result<ProcessedImage, PipelineError> {
    let limit = config.max_source_bytes;
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(
        &mut tokio::io::AsyncReadExt::take(&mut reader, limit.saturating_add(1)),
        &mut buffer,
    )
    .await
    .map_err(|e| {
        PipelineError::new(
            PipelineStage::SourceLoad,
            PfpError::source_unavailable(format!("Failed to read from stream: {}", e)),
        )
    })?;

    if buffer.len() as u64 > limit {
        return Err(PipelineError::new(
            PipelineStage::SourceLoad,
            PfpError::source_unavailable(format!(
                "stream is larger than the {} byte limit",
                limit
            )),
        ));
    }

    generate_from_bytes(&buffer, operations, config, remover).await
}
