//! Collaborator services used by the pipeline

pub mod format;
pub mod io;
pub mod progress;
pub mod source;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter, ProgressTracker,
    ProgressUpdate,
};
pub use source::{DefaultSourceLoader, SourceLoader};
