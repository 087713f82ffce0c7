//! Progress reporting service
//!
//! Separates progress reporting from the pipeline so each front-end can
//! render stage progress its own way.

use crate::{error::PipelineStage, types::ProcessingMetadata};
use instant::Instant;
use std::sync::Arc;

impl PipelineStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::SourceLoad => "Loading source image".to_string(),
            Self::Parse { index } => format!("Parsing operation #{}", index),
            Self::Decode => "Decoding image".to_string(),
            Self::Operation { index, operation } => {
                format!("Running operation #{} ({})", index, operation)
            },
            Self::Encode => "Encoding output".to_string(),
        }
    }
}

/// Progress update for one pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// Progress percentage (0-100) across all stages of the invocation
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

/// Trait for reporting progress during a pipeline invocation
pub trait ProgressReporter: Send + Sync {
    /// A stage is about to start
    fn report_progress(&self, update: ProgressUpdate);

    /// The invocation finished successfully
    fn report_completion(&self, metadata: &ProcessingMetadata);

    /// A stage failed; the invocation is aborted
    fn report_error(&self, stage: PipelineStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _metadata: &ProcessingMetadata) {}

    fn report_error(&self, _stage: PipelineStage, _error: &str) {}
}

/// Progress reporter that writes through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, metadata: &ProcessingMetadata) {
        log::info!(
            "Pipeline completed in {}ms ({} operations)",
            metadata.total_ms,
            metadata.operation_count
        );
        if self.verbose {
            log::info!("  {}", metadata.timing_summary());
        }
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        log::error!("Error during {}: {}", stage, error);
    }
}

/// Per-invocation tracker that turns stage transitions into progress updates
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    total_steps: usize,
    completed_steps: usize,
    current_stage: Option<PipelineStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>, total_steps: usize) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            total_steps: total_steps.max(1),
            completed_steps: 0,
            current_stage: None,
        }
    }

    /// Report that `stage` is starting
    pub fn report_stage(&mut self, stage: PipelineStage) {
        if self.current_stage.is_some() {
            self.completed_steps = (self.completed_steps + 1).min(self.total_steps);
        }
        self.current_stage = Some(stage);
        let progress = (self.completed_steps * 100 / self.total_steps) as u8;
        self.reporter.report_progress(ProgressUpdate {
            stage,
            progress,
            description: stage.description(),
            elapsed_ms: self.elapsed_ms(),
        });
    }

    pub fn report_completion(&self, metadata: &ProcessingMetadata) {
        self.reporter.report_completion(metadata);
    }

    pub fn report_error(&self, stage: PipelineStage, error: &str) {
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<&PipelineStage> {
        self.current_stage.as_ref()
    }
}
