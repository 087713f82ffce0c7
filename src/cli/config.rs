//! Conversion of CLI arguments into pipeline configuration and operations

use crate::cli::main_impl::Cli;
use crate::{
    backends::{BackgroundRemover, HttpBackgroundRemover, UnavailableRemover},
    config::{PipelineConfig, PipelineConfigBuilder},
    utils::NumericValidator,
};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::{sync::Arc, time::Duration};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a `PipelineConfig` from the optional config file and CLI overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let base = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        let mut builder = PipelineConfigBuilder::from_config(base);
        if let Some(format) = cli.format {
            builder = builder.output_format(format.into());
        }
        if let Some(quality) = cli.jpeg_quality {
            builder = builder.jpeg_quality(quality);
        }
        if let Some(seconds) = cli.timeout {
            let timeout = Duration::try_from_secs_f64(seconds)
                .context("Timeout must be a non-negative number of seconds")?;
            builder = builder.removal_timeout(timeout);
        }
        if let Some(limit) = cli.max_dimension {
            builder = builder.max_image_dimension(Some(limit));
        }
        if cli.no_color_profile {
            builder = builder.preserve_color_profiles(false);
        }

        builder.build().context("Invalid configuration")
    }

    /// Pick the background remover; without an endpoint removal always fails
    pub(crate) fn remover_from_cli(
        cli: &Cli,
        config: &PipelineConfig,
    ) -> Result<Arc<dyn BackgroundRemover>> {
        match &cli.remover_url {
            Some(url) => {
                let mut remover = HttpBackgroundRemover::new(url.clone(), config.removal_timeout)
                    .context("Invalid removal service endpoint")?;
                if let Some(key) = &cli.remover_api_key {
                    remover = remover.with_api_key(key.clone());
                }
                Ok(Arc::new(remover))
            },
            None => {
                if cli.remove_background {
                    log::warn!(
                        "No --remover-url given; background removal will fail"
                    );
                }
                Ok(Arc::new(UnavailableRemover))
            },
        }
    }

    /// Wire operations from `--operations`, or assembled from convenience flags
    ///
    /// Convenience flags always produce the canonical order: remove background,
    /// adjustments, filter, background, crop, template.
    pub(crate) fn operations_from_cli(cli: &Cli) -> Result<Vec<Value>> {
        if let Some(source) = &cli.operations {
            let text = if source.trim_start().starts_with('[') {
                source.clone()
            } else {
                std::fs::read_to_string(source)
                    .with_context(|| format!("Failed to read operations file {}", source))?
            };
            return serde_json::from_str(&text).context("Operations must be a JSON array");
        }

        let mut operations = Vec::new();
        if cli.remove_background {
            operations.push(json!("removeBackground"));
        }

        let mut adjustments = Map::new();
        for (name, value) in [
            ("brightness", cli.brightness),
            ("contrast", cli.contrast),
            ("saturation", cli.saturation),
            ("hue", cli.hue),
            ("gamma", cli.gamma),
            ("blur", cli.blur),
            ("sharpening", cli.sharpen),
        ] {
            if let Some(value) = value {
                adjustments.insert(name.to_string(), json!(value));
            }
        }
        if !adjustments.is_empty() {
            operations.push(json!({ "adjustments": adjustments }));
        }

        if let Some(filter) = &cli.filter {
            operations.push(json!({ "filter": filter }));
        }
        if let Some(value) = &cli.background {
            let mut background = Map::new();
            background.insert(
                "type".to_string(),
                json!(cli.background_type.as_deref().unwrap_or("color")),
            );
            background.insert("value".to_string(), json!(value));
            if let Some(blur) = cli.background_blur {
                background.insert("blur".to_string(), json!(blur));
            }
            operations.push(json!({ "addBackground": background }));
        }
        if let Some(shape) = &cli.shape {
            operations.push(json!({ "cropToShape": { "shape": shape, "size": cli.size } }));
        }
        if let Some(platform) = &cli.platform {
            operations.push(json!({ "applyTemplate": { "platform": platform } }));
        }

        Ok(operations)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        let uses_flags = cli.remove_background
            || cli.filter.is_some()
            || cli.background.is_some()
            || cli.shape.is_some()
            || cli.platform.is_some()
            || [
                cli.brightness,
                cli.contrast,
                cli.saturation,
                cli.hue,
                cli.gamma,
                cli.blur,
                cli.sharpen,
            ]
            .iter()
            .any(Option::is_some);
        if cli.operations.is_some() && uses_flags {
            anyhow::bail!("--operations cannot be combined with individual operation flags");
        }

        if let Some(quality) = cli.jpeg_quality {
            NumericValidator::validate_quality(quality).context("Invalid JPEG quality")?;
        }
        if let Some(seconds) = cli.timeout {
            if !(seconds.is_finite() && seconds > 0.0) {
                anyhow::bail!("--timeout must be a positive number of seconds");
            }
        }
        if cli.remover_api_key.is_some() && cli.remover_url.is_none() {
            anyhow::bail!("--remover-api-key requires --remover-url");
        }

        Ok(())
    }
}
