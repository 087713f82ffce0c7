//! Profile picture pipeline CLI
//!
//! Reads one image (path, URL or stdin), runs an operation list through the
//! `PipelineProcessor` and writes the encoded result.

use super::config::CliConfigBuilder;
use crate::{
    config::OutputFormat,
    operations::{FilterPreset, Platform, Shape},
    processor::PipelineProcessor,
    services::{ConsoleProgressReporter, OutputFormatHandler},
    tracing_config::{spans, TracingConfig, TracingFormat},
    types::ProcessedImage,
    wire::{parse_operations, ErrorResponse, ProcessRequest, ProcessResponse},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::Instrument;

/// Profile picture generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "pfpgen")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image path or http(s) URL (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "list_presets")]
    pub input: Option<String>,

    /// Output file. Use "-" for stdout [default: <INPUT>_pfp.<ext> for files, stdout otherwise]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Operation list as inline JSON array or path to a JSON file
    #[arg(long, value_name = "JSON|PATH")]
    pub operations: Option<String>,

    /// Remove the background first
    #[arg(long)]
    pub remove_background: bool,

    /// Brightness adjustment (-100..=100)
    #[arg(long, allow_hyphen_values = true)]
    pub brightness: Option<f32>,

    /// Contrast adjustment (-100..=100)
    #[arg(long, allow_hyphen_values = true)]
    pub contrast: Option<f32>,

    /// Saturation adjustment (-100..=100)
    #[arg(long, allow_hyphen_values = true)]
    pub saturation: Option<f32>,

    /// Hue rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub hue: Option<f32>,

    /// Gamma (> 0)
    #[arg(long)]
    pub gamma: Option<f32>,

    /// Gaussian blur sigma
    #[arg(long)]
    pub blur: Option<f32>,

    /// Unsharp mask strength
    #[arg(long)]
    pub sharpen: Option<f32>,

    /// Filter preset (none, professional, vintage, dramatic, soft, blackwhite, warm, cool)
    #[arg(long)]
    pub filter: Option<String>,

    /// Background type (color, gradient, pattern, image)
    #[arg(long, requires = "background")]
    pub background_type: Option<String>,

    /// Background value: color, gradient stops, pattern name or image reference
    #[arg(long)]
    pub background: Option<String>,

    /// Blur sigma for image backgrounds
    #[arg(long)]
    pub background_blur: Option<f32>,

    /// Crop shape (circle, square, rounded-square, heart, star)
    #[arg(long)]
    pub shape: Option<String>,

    /// Crop size in pixels
    #[arg(long, default_value_t = 400)]
    pub size: u32,

    /// Export for a social platform (linkedin, instagram, twitter, facebook, tiktok)
    #[arg(long)]
    pub platform: Option<String>,

    /// Background removal service endpoint
    #[arg(long, value_name = "URL")]
    pub remover_url: Option<String>,

    /// Bearer token for the removal service
    #[arg(long, value_name = "KEY")]
    pub remover_api_key: Option<String>,

    /// Background removal timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Downscale sources whose longer side exceeds this many pixels
    #[arg(long, value_name = "PIXELS")]
    pub max_dimension: Option<u32>,

    /// Do not embed the source ICC color profile in the output
    #[arg(long)]
    pub no_color_profile: bool,

    /// Print a JSON response (or error) document to stdout after processing
    #[arg(long)]
    pub json: bool,

    /// List filters, shapes, platforms and background types, then exit
    #[arg(long)]
    pub list_presets: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}

/// Run the CLI with arguments from the process environment
///
/// # Errors
/// - Invalid arguments or configuration
/// - Any pipeline failure, with context
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id = uuid::Uuid::new_v4().to_string();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(TracingFormat::Console)
        .with_session_id(session_id.clone())
        .init()
        .context("Failed to initialize tracing")?;

    if cli.list_presets {
        list_presets();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let remover = CliConfigBuilder::remover_from_cli(&cli, &config)
        .context("Failed to configure background removal")?;
    let operations =
        CliConfigBuilder::operations_from_cli(&cli).context("Failed to read operations")?;
    let input = cli
        .input
        .clone()
        .context("An input image is required")?;

    let processor = PipelineProcessor::builder()
        .config(config)
        .remover(remover)
        .reporter(Arc::new(ConsoleProgressReporter::new(cli.verbose > 0)))
        .build()
        .context("Failed to create pipeline processor")?;

    let span = spans::session(&session_id, &input, operations.len());
    let outcome = run(&cli, &processor, &input, operations.clone())
        .instrument(span)
        .await;

    match outcome {
        Ok(destination) => {
            if cli.json {
                let response = ProcessResponse {
                    id: session_id,
                    processed_url: destination,
                    operations,
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            Ok(())
        },
        Err(err) => {
            if cli.json {
                if let Some(pipeline_error) = err.downcast_ref::<crate::PipelineError>() {
                    let response = ErrorResponse::from(pipeline_error);
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
            }
            Err(err)
        },
    }
}

/// Process the input and write the result, returning where it was written
async fn run(
    cli: &Cli,
    processor: &PipelineProcessor,
    input: &str,
    operations: Vec<serde_json::Value>,
) -> Result<String> {
    let result = if input == "-" {
        info!("Reading image from stdin");
        let bytes = read_limited(io::stdin().lock(), processor.config().max_source_bytes)
            .context("Failed to read image data from stdin")?;
        let typed = parse_operations(&operations)?;
        processor.process_bytes(&bytes, &typed).await?
    } else {
        let request = ProcessRequest {
            image_url: input.to_string(),
            operations,
        };
        processor.process_request(&request).await?
    };

    info!(
        "Produced {} {} image ({} bytes, sha256 {})",
        result.dimensions,
        result.format,
        result.bytes.len(),
        result.digest()
    );
    if cli.verbose > 0 {
        info!("{}", result.metadata.timing_summary());
    }

    let destination = resolve_destination(cli.output.as_deref(), input, result.format);
    write_output(&result, &destination)?;
    Ok(destination)
}

/// Where to write the result: explicit `-o`, `<stem>_pfp.<ext>` next to a file input, or stdout
fn resolve_destination(output: Option<&str>, input: &str, format: OutputFormat) -> String {
    if let Some(output) = output {
        return output.to_string();
    }
    let path = Path::new(input);
    if input == "-" || input.contains("://") || path.file_stem().is_none() {
        return "-".to_string();
    }
    generate_output_path(path, format)
        .to_string_lossy()
        .to_string()
}

fn generate_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    let dir = input_path.parent().unwrap_or(Path::new("."));
    dir.join(format!(
        "{}_pfp.{}",
        stem.to_string_lossy(),
        OutputFormatHandler::get_extension(format)
    ))
}

fn write_output(result: &ProcessedImage, destination: &str) -> Result<()> {
    let _span = spans::output(destination, &result.format.to_string()).entered();
    if destination == "-" {
        write_stdout(&result.bytes)?;
        info!("Image written to stdout");
        return Ok(());
    }

    let path = Path::new(destination);
    let expected = OutputFormatHandler::get_extension(result.format);
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if OutputFormatHandler::from_extension(ext).ok() != Some(result.format) {
            warn!(
                "Output extension .{} does not match the {} format (expected .{})",
                ext, result.format, expected
            );
        }
    }
    std::fs::write(path, &result.bytes)
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    info!("Image saved to: {}", path.display());
    Ok(())
}

fn list_presets() {
    println!("Filters:");
    for preset in FilterPreset::ALL {
        println!("  - {}", preset);
    }
    println!("Shapes:");
    for shape in Shape::ALL {
        println!("  - {}", shape);
    }
    println!("Platforms:");
    for platform in Platform::ALL {
        println!("  - {} ({})", platform, platform.style());
    }
    println!("Background types:");
    for kind in crate::operations::BackgroundSpec::TYPES {
        println!("  - {}", kind);
    }
}

/// Read at most `limit` bytes, failing on empty or oversized input
fn read_limited<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No data received");
    }
    if buffer.len() as u64 > limit {
        anyhow::bail!("Input is larger than the {} byte limit", limit);
    }

    Ok(buffer)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
