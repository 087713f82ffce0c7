//! Pipeline orchestrator
//!
//! `PipelineProcessor` validates a list of operations, runs them strictly in
//! caller order and stops at the first failure. It is shared by the CLI and by
//! library callers so both get the same behavior. CPU-bound stages run on the
//! blocking pool; the background remover and source loader are awaited directly.

use crate::{
    backends::{BackgroundRemover, UnavailableRemover},
    config::{OutputFormat, PipelineConfig},
    error::{ErrorKind, PfpError, PipelineError, PipelineStage, Result},
    operations::{
        adjust, apply_filter, apply_template, compose, crop_to_shape, BackgroundFill, Operation,
    },
    services::{
        DefaultSourceLoader, ImageIOService, NoOpProgressReporter, ProgressReporter,
        ProgressTracker, SourceLoader,
    },
    types::{Dimensions, ProcessedImage, ProcessingMetadata, RasterImage},
    wire::{parse_operations, ProcessRequest},
};
use chrono::Utc;
use instant::Instant;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, span, warn, Instrument, Level};

/// Network timeout for fetching source and background images
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Runs operation lists against images
///
/// Holds only immutable configuration and shared collaborators, so one
/// processor can serve any number of concurrent invocations.
#[derive(Clone)]
pub struct PipelineProcessor {
    config: PipelineConfig,
    remover: Arc<dyn BackgroundRemover>,
    loader: Arc<dyn SourceLoader>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for PipelineProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for `PipelineProcessor`
#[derive(Default)]
pub struct PipelineProcessorBuilder {
    config: PipelineConfig,
    remover: Option<Arc<dyn BackgroundRemover>>,
    loader: Option<Arc<dyn SourceLoader>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineProcessorBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    #[must_use]
    pub fn loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Build the processor
    ///
    /// Without an explicit remover every background removal fails; without an
    /// explicit loader sources are read with a [`DefaultSourceLoader`] bound
    /// by the configured size limit.
    ///
    /// # Errors
    /// - Any rule of [`PipelineConfig::validate`]
    /// - `Internal` when the default loader cannot be created
    pub fn build(self) -> Result<PipelineProcessor> {
        self.config.validate()?;
        let loader = match self.loader {
            Some(loader) => loader,
            None => Arc::new(DefaultSourceLoader::new(
                self.config.max_source_bytes,
                DEFAULT_FETCH_TIMEOUT,
            )?),
        };

        Ok(PipelineProcessor {
            config: self.config,
            remover: self.remover.unwrap_or_else(|| Arc::new(UnavailableRemover)),
            loader,
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(NoOpProgressReporter)),
        })
    }
}

impl PipelineProcessor {
    #[must_use]
    pub fn builder() -> PipelineProcessorBuilder {
        PipelineProcessorBuilder::default()
    }

    /// Create a processor with the default loader and a silent reporter
    ///
    /// # Errors
    /// - Any error of [`PipelineProcessorBuilder::build`]
    pub fn new(config: PipelineConfig, remover: Arc<dyn BackgroundRemover>) -> Result<Self> {
        Self::builder().config(config).remover(remover).build()
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `operations` in order on a decoded image
    ///
    /// # Errors
    /// - The first failing stage, with the index of its operation
    pub async fn run(
        &self,
        source: RasterImage,
        operations: &[Operation],
    ) -> PipelineResult<RasterImage> {
        self.run_with_cancellation(source, operations, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), checking `cancel` before every stage
    ///
    /// A stage already in flight when the token fires completes, and its
    /// result is discarded.
    ///
    /// # Errors
    /// - `Cancelled` once the token has fired
    /// - The first failing stage, with the index of its operation
    pub async fn run_with_cancellation(
        &self,
        source: RasterImage,
        operations: &[Operation],
        cancel: &CancellationToken,
    ) -> PipelineResult<RasterImage> {
        let mut tracker = ProgressTracker::new(self.reporter.clone(), operations.len());
        let mut metadata = ProcessingMetadata::new(Utc::now());
        self.execute(source, operations, cancel, &mut tracker, &mut metadata)
            .await
    }

    /// Decode `bytes`, run `operations` and encode in the configured format
    ///
    /// # Errors
    /// - `DecodeFailure` at the decode stage
    /// - The first failing operation
    /// - `EncodeFailure` at the encode stage
    pub async fn process_bytes(
        &self,
        bytes: &[u8],
        operations: &[Operation],
    ) -> PipelineResult<ProcessedImage> {
        self.process_bytes_with_cancellation(bytes, operations, &CancellationToken::new())
            .await
    }

    /// Like [`process_bytes`](Self::process_bytes), honoring `cancel`
    ///
    /// # Errors
    /// - Any error of [`process_bytes`](Self::process_bytes)
    /// - `Cancelled` once the token has fired
    #[instrument(
        skip(self, bytes, operations, cancel),
        fields(
            input_bytes = bytes.len(),
            operations = operations.len(),
            format = %self.config.output_format
        )
    )]
    pub async fn process_bytes_with_cancellation(
        &self,
        bytes: &[u8],
        operations: &[Operation],
        cancel: &CancellationToken,
    ) -> PipelineResult<ProcessedImage> {
        let started_at = Utc::now();
        let total_start = Instant::now();
        let mut metadata = ProcessingMetadata::new(started_at);
        let mut tracker = ProgressTracker::new(self.reporter.clone(), operations.len() + 2);

        validate_all(operations, &tracker)?;
        let image = self.decode_stage(bytes, &mut tracker, &mut metadata).await?;
        let image = self
            .execute(image, operations, cancel, &mut tracker, &mut metadata)
            .await?;
        check_cancelled(cancel, PipelineStage::Encode, &tracker)?;
        let format = self.config.output_format;
        let encoded = self.encode_stage(image, &mut tracker, &mut metadata).await?;

        metadata.total_ms = total_start.elapsed().as_millis() as u64;
        let (bytes, dimensions) = encoded;
        let processed = ProcessedImage::new(bytes, format, dimensions, metadata);
        tracker.report_completion(&processed.metadata);
        info!(
            width = dimensions.width,
            height = dimensions.height,
            output_bytes = processed.bytes.len(),
            total_ms = processed.metadata.total_ms,
            "Pipeline completed"
        );
        Ok(processed)
    }

    /// Fetch the referenced image, parse the wire operations and process
    ///
    /// Operations are parsed before anything is fetched.
    ///
    /// # Errors
    /// - Parse and domain errors, with the index of the offending operation
    /// - `SourceUnavailable` at the source load stage
    /// - Any error of [`process_bytes`](Self::process_bytes)
    pub async fn process_request(&self, request: &ProcessRequest) -> PipelineResult<ProcessedImage> {
        let operations = parse_operations(&request.operations)?;
        let bytes = self
            .loader
            .load(&request.image_url)
            .await
            .map_err(|e| {
                let e = coerce_kind(e, ErrorKind::SourceUnavailable, PfpError::source_unavailable);
                self.reporter
                    .report_error(PipelineStage::SourceLoad, &e.to_string());
                PipelineError::new(PipelineStage::SourceLoad, e)
            })?;
        debug!(bytes = bytes.len(), "Source loaded");
        self.process_bytes(&bytes, &operations).await
    }

    async fn decode_stage(
        &self,
        bytes: &[u8],
        tracker: &mut ProgressTracker,
        metadata: &mut ProcessingMetadata,
    ) -> PipelineResult<RasterImage> {
        let stage = PipelineStage::Decode;
        tracker.report_stage(stage);
        let start = Instant::now();
        let owned = bytes.to_vec();
        let limit = self.config.max_image_dimension;
        let image = blocking(move || ImageIOService::decode(&owned, limit))
            .await
            .map_err(|e| fail(stage, e, tracker))?;
        metadata.record_stage(None, "decode", start.elapsed().as_millis() as u64);
        Ok(image)
    }

    async fn encode_stage(
        &self,
        image: RasterImage,
        tracker: &mut ProgressTracker,
        metadata: &mut ProcessingMetadata,
    ) -> PipelineResult<(Vec<u8>, Dimensions)> {
        let stage = PipelineStage::Encode;
        tracker.report_stage(stage);
        let start = Instant::now();
        let dimensions = Dimensions::new(image.width(), image.height());
        let format = self.config.output_format;
        let quality = self.config.output_quality();
        let embed = self.config.preserve_color_profiles;
        let bytes = blocking(move || ImageIOService::encode(&image, format, quality, embed))
            .await
            .map_err(|e| fail(stage, e, tracker))?;
        metadata.record_stage(None, "encode", start.elapsed().as_millis() as u64);
        Ok((bytes, dimensions))
    }

    async fn execute(
        &self,
        mut image: RasterImage,
        operations: &[Operation],
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
        metadata: &mut ProcessingMetadata,
    ) -> PipelineResult<RasterImage> {
        validate_all(operations, tracker)?;
        metadata.operation_count = operations.len();

        // Stages work on profile-free rasters; the source profile is restored at the end
        let profile = image.take_color_profile();
        if let Some(profile) = &profile {
            debug!(
                color_space = %profile.color_space(),
                profile_size_bytes = profile.data_size(),
                "Carrying ICC color profile through the pipeline"
            );
        }

        for (index, operation) in operations.iter().enumerate() {
            let kind = operation.kind();
            let stage = PipelineStage::Operation {
                index,
                operation: kind,
            };
            check_cancelled(cancel, stage, tracker)?;
            tracker.report_stage(stage);

            let start = Instant::now();
            let span = span!(Level::INFO, "operation", index, kind = %kind);
            let next = self
                .apply(image, operation)
                .instrument(span)
                .await
                .map_err(|e| fail(stage, e, tracker))?;

            if cancel.is_cancelled() {
                debug!(index, "Discarding result of stage finished after cancellation");
                return Err(cancelled(stage, tracker));
            }

            let elapsed = start.elapsed().as_millis() as u64;
            debug!(index, %kind, elapsed_ms = elapsed, "Operation finished");
            metadata.record_stage(Some(index), kind.as_str(), elapsed);
            image = next;
        }

        Ok(image.with_color_profile(profile))
    }

    async fn apply(&self, image: RasterImage, operation: &Operation) -> Result<RasterImage> {
        match operation {
            Operation::RemoveBackground => self.remove_background(image).await,
            Operation::Adjustments(adjustment) => {
                let adjustment = *adjustment;
                blocking(move || adjust(&image, &adjustment)).await
            },
            Operation::Filter(preset) => {
                let preset = *preset;
                blocking(move || apply_filter(&image, preset)).await
            },
            Operation::AddBackground(spec) => {
                let fill = BackgroundFill::resolve(spec, self.loader.as_ref()).await?;
                let (width, height) = spec.canvas_size(image.dimensions());
                blocking(move || compose(&image, &fill, width, height)).await
            },
            Operation::CropToShape(spec) => {
                let spec = *spec;
                blocking(move || crop_to_shape(&image, &spec)).await
            },
            Operation::ApplyTemplate(target) => {
                let target = *target;
                let templates = self.config.templates.clone();
                blocking(move || apply_template(&image, target, &templates)).await
            },
        }
    }

    async fn remove_background(&self, image: RasterImage) -> Result<RasterImage> {
        let (width, height) = image.dimensions();
        let request = blocking(move || {
            ImageIOService::encode(&image, OutputFormat::Png, 100, false)
        })
        .await?;

        let budget = self.config.removal_timeout;
        let answer =
            match tokio::time::timeout(budget, self.remover.remove_background(&request)).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    return Err(coerce_kind(
                        e,
                        ErrorKind::ExternalServiceFailure,
                        PfpError::external_service,
                    ))
                },
                Err(_) => {
                    warn!(timeout_ms = budget.as_millis() as u64, "Background removal timed out");
                    return Err(PfpError::ExternalServiceTimeout(budget.as_millis() as u64));
                },
            };

        let isolated = blocking(move || ImageIOService::decode(&answer, None)).await?;
        if isolated.dimensions() != (width, height) {
            warn!(
                expected = %Dimensions::new(width, height),
                actual = %Dimensions::new(isolated.width(), isolated.height()),
                "Background remover changed the image size"
            );
        }
        Ok(isolated)
    }
}

/// Run a CPU-bound stage on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PfpError::internal(format!("stage task failed: {}", e)))?
}

/// Domain checks for every operation before any of them runs
fn validate_all(operations: &[Operation], tracker: &ProgressTracker) -> PipelineResult<()> {
    for (index, operation) in operations.iter().enumerate() {
        operation.validate().map_err(|e| {
            fail(
                PipelineStage::Operation {
                    index,
                    operation: operation.kind(),
                },
                e,
                tracker,
            )
        })?;
    }
    Ok(())
}

/// Keep errors of the expected kind, wrap anything else into it
fn coerce_kind(error: PfpError, kind: ErrorKind, wrap: fn(String) -> PfpError) -> PfpError {
    if error.kind() == kind {
        error
    } else {
        wrap(error.to_string())
    }
}

fn fail(stage: PipelineStage, error: PfpError, tracker: &ProgressTracker) -> PipelineError {
    tracker.report_error(stage, &error.to_string());
    PipelineError::new(stage, error)
}

fn cancelled(stage: PipelineStage, tracker: &ProgressTracker) -> PipelineError {
    fail(
        stage,
        PfpError::Cancelled(format!("cancelled before {}", stage)),
        tracker,
    )
}

fn check_cancelled(
    cancel: &CancellationToken,
    stage: PipelineStage,
    tracker: &ProgressTracker,
) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        return Err(cancelled(stage, tracker));
    }
    Ok(())
}
