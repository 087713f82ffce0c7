//! Error types for profile picture pipeline operations

use crate::operations::OperationKind;
use thiserror::Error;

/// Result type alias for pipeline stage operations
pub type Result<T> = std::result::Result<T, PfpError>;

/// Failure kinds surfaced to callers of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    UnknownFilter,
    UnknownPlatform,
    InvalidShape,
    InvalidBackgroundType,
    SourceUnavailable,
    ImageLoadFailure,
    ExternalServiceFailure,
    ExternalServiceTimeout,
    DecodeFailure,
    EncodeFailure,
    Cancelled,
    InternalFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidInput => "InvalidInput",
            Self::UnknownFilter => "UnknownFilter",
            Self::UnknownPlatform => "UnknownPlatform",
            Self::InvalidShape => "InvalidShape",
            Self::InvalidBackgroundType => "InvalidBackgroundType",
            Self::SourceUnavailable => "SourceUnavailable",
            Self::ImageLoadFailure => "ImageLoadFailure",
            Self::ExternalServiceFailure => "ExternalServiceFailure",
            Self::ExternalServiceTimeout => "ExternalServiceTimeout",
            Self::DecodeFailure => "DecodeFailure",
            Self::EncodeFailure => "EncodeFailure",
            Self::Cancelled => "Cancelled",
            Self::InternalFailure => "InternalFailure",
        };
        f.write_str(name)
    }
}

/// Errors produced by a single pipeline stage or collaborator
#[derive(Error, Debug)]
pub enum PfpError {
    /// Values outside their documented domains
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Invalid background type: {0}")]
    InvalidBackgroundType(String),

    /// An externally referenced image could not be fetched
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// An externally referenced image was fetched but could not be decoded
    #[error("Image load failure: {0}")]
    ImageLoadFailure(String),

    /// The background removal service failed
    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    /// The background removal service exceeded its time budget
    #[error("External service timed out after {0}ms")]
    ExternalServiceTimeout(u64),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    #[error("Processing cancelled: {0}")]
    Cancelled(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PfpError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn image_load<S: Into<String>>(msg: S) -> Self {
        Self::ImageLoadFailure(msg.into())
    }

    pub fn external_service<S: Into<String>>(msg: S) -> Self {
        Self::ExternalServiceFailure(msg.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::DecodeFailure(msg.into())
    }

    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::EncodeFailure(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a domain error for a numeric parameter with its valid range
    pub fn value_out_of_range<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidInput(format!(
            "{} = {} is outside its domain (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Create an error for an unrecognized enumeration value, listing the accepted ones
    pub fn unknown_variant(kind: ErrorKind, value: &str, accepted: &[&str]) -> Self {
        let msg = format!("'{}' (expected one of: {})", value, accepted.join(", "));
        match kind {
            ErrorKind::UnknownFilter => Self::UnknownFilter(msg),
            ErrorKind::UnknownPlatform => Self::UnknownPlatform(msg),
            ErrorKind::InvalidShape => Self::InvalidShape(msg),
            ErrorKind::InvalidBackgroundType => Self::InvalidBackgroundType(msg),
            _ => Self::InvalidInput(msg),
        }
    }

    /// The failure kind of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UnknownFilter(_) => ErrorKind::UnknownFilter,
            Self::UnknownPlatform(_) => ErrorKind::UnknownPlatform,
            Self::InvalidShape(_) => ErrorKind::InvalidShape,
            Self::InvalidBackgroundType(_) => ErrorKind::InvalidBackgroundType,
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Self::ImageLoadFailure(_) => ErrorKind::ImageLoadFailure,
            Self::ExternalServiceFailure(_) => ErrorKind::ExternalServiceFailure,
            Self::ExternalServiceTimeout(_) => ErrorKind::ExternalServiceTimeout,
            Self::DecodeFailure(_) => ErrorKind::DecodeFailure,
            Self::EncodeFailure(_) => ErrorKind::EncodeFailure,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::InternalFailure,
        }
    }
}

/// Where in a pipeline invocation a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Fetching the source image by reference
    SourceLoad,
    /// Converting the wire form of the operation at `index`
    Parse { index: usize },
    /// Decoding the source bytes
    Decode,
    /// Validating or executing the operation at `index`
    Operation {
        index: usize,
        operation: OperationKind,
    },
    /// Encoding the final image
    Encode,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceLoad => write!(f, "source load"),
            Self::Parse { index } => write!(f, "parsing operation #{}", index),
            Self::Decode => write!(f, "decode"),
            Self::Operation { index, operation } => {
                write!(f, "operation #{} ({})", index, operation)
            },
            Self::Encode => write!(f, "encode"),
        }
    }
}

/// The single structured failure returned by a pipeline invocation
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: PfpError,
}

impl PipelineError {
    #[must_use]
    pub fn new(stage: PipelineStage, source: PfpError) -> Self {
        Self { stage, source }
    }

    /// Wrap a stage error with the operation that triggered it
    #[must_use]
    pub fn at_operation(index: usize, operation: OperationKind, source: PfpError) -> Self {
        Self::new(PipelineStage::Operation { index, operation }, source)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Index of the failing operation, if the failure came from one
    #[must_use]
    pub fn operation_index(&self) -> Option<usize> {
        match self.stage {
            PipelineStage::Operation { index, .. } | PipelineStage::Parse { index } => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.source.to_string()
    }
}
