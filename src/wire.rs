//! JSON shapes exchanged with the surrounding application
//!
//! Operations arrive as a JSON array in camelCase, externally tagged form:
//!
//! ```json
//! ["removeBackground",
//!  {"adjustments": {"brightness": 10, "contrast": 5}},
//!  {"filter": "warm"},
//!  {"addBackground": {"type": "color", "value": "#336699"}},
//!  {"cropToShape": {"shape": "circle", "size": 400}},
//!  {"applyTemplate": {"platform": "linkedin"}}]
//! ```
//!
//! Each element is parsed into a [`RawOperation`] and converted into a typed
//! [`Operation`] once, before anything runs. Failures carry the element index.

use crate::{
    error::{PfpError, PipelineError, PipelineStage, Result},
    operations::{
        Adjustment, BackgroundSpec, FilterPreset, Operation, OperationKind, Platform, Shape,
        ShapeSpec, SocialTarget,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped operation as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawOperation {
    RemoveBackground,
    Adjustments(Adjustment),
    Filter(RawFilter),
    AddBackground(RawBackground),
    CropToShape(RawShape),
    ApplyTemplate(RawTemplate),
}

/// Filter name, either bare or wrapped in `{"name": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFilter {
    Name(String),
    Named { name: String },
}

impl RawFilter {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Named { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBackground {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawShape {
    pub shape: String,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTemplate {
    pub platform: String,
}

impl RawOperation {
    /// Resolve names and domains into a typed operation
    ///
    /// # Errors
    /// - `UnknownFilter`, `InvalidShape`, `UnknownPlatform` or
    ///   `InvalidBackgroundType` for unrecognized names
    /// - `InvalidInput` for out-of-domain values
    pub fn into_operation(self) -> Result<Operation> {
        let operation = match self {
            Self::RemoveBackground => Operation::RemoveBackground,
            Self::Adjustments(adjustment) => Operation::Adjustments(adjustment),
            Self::Filter(filter) => Operation::Filter(filter.name().parse::<FilterPreset>()?),
            Self::AddBackground(raw) => Operation::AddBackground(
                BackgroundSpec::from_parts(&raw.kind, &raw.value, raw.blur)?
                    .with_size(raw.width, raw.height),
            ),
            Self::CropToShape(raw) => {
                Operation::CropToShape(ShapeSpec::new(raw.shape.parse::<Shape>()?, raw.size)?)
            },
            Self::ApplyTemplate(raw) => Operation::ApplyTemplate(SocialTarget {
                platform: raw.platform.parse::<Platform>()?,
            }),
        };
        operation.validate()?;
        Ok(operation)
    }

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
}

/// Convert a JSON array of wire operations into typed operations
///
/// # Errors
/// - A `PipelineError` at `Parse { index }` when an element is malformed
/// - A `PipelineError` at `Operation { index, .. }` when an element names an
///   unknown variant or an out-of-domain value
pub fn parse_operations(values: &[Value]) -> std::result::Result<Vec<Operation>, PipelineError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let raw: RawOperation = serde_json::from_value(value.clone()).map_err(|e| {
                PipelineError::new(
                    PipelineStage::Parse { index },
                    PfpError::invalid_input(format!("malformed operation: {}", e)),
                )
            })?;
            let kind = raw.kind();
            raw.into_operation().map_err(|e| {
                log::debug!("Operation #{} ({}) rejected: {}", index, kind, e);
                PipelineError::at_operation(index, kind, e)
            })
        })
        .collect()
}

/// Parse a JSON document holding an operation array
///
/// # Errors
/// - `InvalidInput` at `Parse { index: 0 }` when the text is not a JSON array
/// - Any error of [`parse_operations`]
pub fn parse_operations_str(json: &str) -> std::result::Result<Vec<Operation>, PipelineError> {
    let values: Vec<Value> = serde_json::from_str(json).map_err(|e| {
        PipelineError::new(
            PipelineStage::Parse { index: 0 },
            PfpError::invalid_input(format!("operations must be a JSON array: {}", e)),
        )
    })?;
    parse_operations(&values)
}

/// Body of a processing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub image_url: String,
    #[serde(default)]
    pub operations: Vec<Value>,
}

/// Body of a successful processing response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub id: String,
    pub processed_url: String,
    pub operations: Vec<Value>,
}

/// Body of a failed processing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Lifecycle of a stored processing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Whether no further transition is expected
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        operations::{BackgroundLayer, Color},
    };
    use serde_json::json;

    #[test]
    fn test_parse_full_operation_list() {
        let ops = parse_operations_str(
            r##"["removeBackground",
                {"adjustments": {"brightness": 10, "contrast": 5}},
                {"filter": "warm"},
                {"filter": {"name": "cool"}},
                {"addBackground": {"type": "color", "value": "#336699"}},
                {"cropToShape": {"shape": "circle", "size": 400}},
                {"applyTemplate": {"platform": "linkedin"}}]"##,
        )
        .unwrap();

        assert_eq!(ops.len(), 7);
        assert_eq!(ops[0], Operation::RemoveBackground);
        assert_eq!(ops[2], Operation::Filter(FilterPreset::Warm));
        assert_eq!(ops[3], Operation::Filter(FilterPreset::Cool));
        match &ops[4] {
            Operation::AddBackground(spec) => {
                assert_eq!(
                    spec.layer,
                    BackgroundLayer::Color(Color::rgb(0x33, 0x66, 0x99))
                );
            },
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(
            ops[5],
            Operation::CropToShape(ShapeSpec {
                shape: Shape::Circle,
                size: 400
            })
        );
        assert_eq!(
            ops[6],
            Operation::ApplyTemplate(SocialTarget {
                platform: Platform::LinkedIn
            })
        );
    }

    #[test]
    fn test_errors_carry_index_and_kind() {
        let values = vec![json!("removeBackground"), json!({"filter": "rainbow"})];
        let err = parse_operations(&values).unwrap_err();
        assert_eq!(err.operation_index(), Some(1));
        assert_eq!(err.kind(), ErrorKind::UnknownFilter);
        assert_eq!(
            err.stage,
            PipelineStage::Operation {
                index: 1,
                operation: OperationKind::Filter
            }
        );

        let values = vec![json!({"adjustments": {"contrast": 500}})];
        let err = parse_operations(&values).unwrap_err();
        assert_eq!(err.operation_index(), Some(0));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let values = vec![
            json!("removeBackground"),
            json!("removeBackground"),
            json!({"explode": true}),
        ];
        let err = parse_operations(&values).unwrap_err();
        assert_eq!(err.stage, PipelineStage::Parse { index: 2 });
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unknown_names_map_to_their_kinds() {
        let cases = [
            (json!({"cropToShape": {"shape": "triangle", "size": 10}}), ErrorKind::InvalidShape),
            (json!({"cropToShape": {"shape": "circle", "size": 0}}), ErrorKind::InvalidInput),
            (json!({"applyTemplate": {"platform": "myspace"}}), ErrorKind::UnknownPlatform),
            (
                json!({"addBackground": {"type": "video", "value": "x"}}),
                ErrorKind::InvalidBackgroundType,
            ),
            (
                json!({"addBackground": {"type": "color", "value": "#12"}}),
                ErrorKind::InvalidInput,
            ),
        ];
        for (value, kind) in cases {
            let err = parse_operations(&[value]).unwrap_err();
            assert_eq!(err.kind(), kind, "{}", err);
            assert_eq!(err.operation_index(), Some(0));
        }
    }

    #[test]
    fn test_request_and_status_shapes() {
        let request: ProcessRequest = serde_json::from_value(json!({
            "imageUrl": "https://cdn.example.com/u/1.jpg",
            "operations": ["removeBackground"]
        }))
        .unwrap();
        assert_eq!(request.image_url, "https://cdn.example.com/u/1.jpg");
        assert_eq!(request.operations.len(), 1);

        let response = ProcessResponse {
            id: "abc".into(),
            processed_url: "out.png".into(),
            operations: request.operations,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["processedUrl"], "out.png");

        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::default().is_terminal());
    }

    #[test]
    fn test_non_array_document() {
        let err = parse_operations_str(r#"{"filter": "warm"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
